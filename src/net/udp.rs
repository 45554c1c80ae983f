//! UDP packet loop with per-IP admission and per-packet handler tasks.

use super::ServerError;
use super::tcp::IO_TIMEOUT;
use crate::context::ProcessContext;
use crate::logger::Logger;
use crate::ratelimit::RateLimit;
use crate::stats::Stats;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Instant;
use tokio::net::UdpSocket;
use tokio::sync::Notify;

/// Largest acceptable datagram.
pub const MAX_PACKET_SIZE: usize = 9038;

/// The application side of a UDP daemon.
#[async_trait::async_trait]
pub trait UdpApp: Send + Sync {
    fn udp_stats(&self) -> Arc<Stats>;

    /// Handle one datagram. `packet` is the handler's own copy; replies go
    /// out through the shared `socket`.
    async fn handle_udp_packet(
        &self,
        logger: &Logger,
        client_ip: IpAddr,
        peer: SocketAddr,
        packet: Vec<u8>,
        socket: Arc<UdpSocket>,
    );
}

/// Mirror of the TCP scaffolding for datagrams.
pub struct UdpServer {
    listen_addr: String,
    listen_port: u16,
    app: Arc<dyn UdpApp>,
    ctx: Arc<ProcessContext>,
    limiter: RateLimit,
    logger: Logger,
    started: AtomicBool,
    shutdown: Notify,
    local_port: AtomicU16,
}

impl UdpServer {
    pub fn new(
        ctx: Arc<ProcessContext>,
        app: Arc<dyn UdpApp>,
        listen_addr: impl Into<String>,
        listen_port: u16,
        limit_per_sec: u64,
    ) -> Self {
        let listen_addr = listen_addr.into();
        let logger = Logger::new("udpserver", format!("{listen_addr}:{listen_port}"));
        Self {
            listen_addr,
            listen_port,
            app,
            ctx,
            limiter: RateLimit::new(1, limit_per_sec),
            logger,
            started: AtomicBool::new(false),
            shutdown: Notify::new(),
            local_port: AtomicU16::new(0),
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port.load(Ordering::SeqCst)
    }

    pub fn add_and_check_rate_limit(&self, client_ip: IpAddr) -> bool {
        self.limiter.add(&client_ip.to_string(), true)
    }

    pub async fn start_and_block(&self) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }
        let socket = Arc::new(
            UdpSocket::bind((self.listen_addr.as_str(), self.listen_port)).await?,
        );
        self.local_port
            .store(socket.local_addr()?.port(), Ordering::SeqCst);
        self.logger.info("start", "receiving packets");
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            if self.ctx.is_locked_down() {
                return Err(ServerError::EmergencyLockDown);
            }
            let (len, peer) = tokio::select! {
                _ = self.shutdown.notified() => {
                    self.logger.info("stop", "socket closed");
                    return Ok(());
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok(pair) => pair,
                    Err(err) if err.to_string().contains("closed") => return Ok(()),
                    Err(err) => {
                        // Transient datagram errors must not kill the loop.
                        self.logger.warn("receive", &err, "failed to read packet");
                        continue;
                    }
                },
            };
            let client_ip = peer.ip();
            if !self.limiter.add(&client_ip.to_string(), true) {
                continue;
            }
            let packet = buf[..len].to_vec();
            let app = self.app.clone();
            let logger = self.logger.clone();
            let socket = socket.clone();
            tokio::spawn(async move {
                let stats = app.udp_stats();
                let started = Instant::now();
                if tokio::time::timeout(
                    IO_TIMEOUT,
                    app.handle_udp_packet(&logger, client_ip, peer, packet, socket),
                )
                .await
                .is_err()
                {
                    logger.info(
                        "handle",
                        format!("packet from {client_ip} exceeded the I/O deadline"),
                    );
                }
                stats.observe(started.elapsed().as_millis() as f64);
            });
        }
    }

    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}
