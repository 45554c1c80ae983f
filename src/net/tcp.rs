//! TCP accept loop with per-IP admission, deadlines and statistics.

use super::ServerError;
use crate::context::ProcessContext;
use crate::logger::Logger;
use crate::ratelimit::RateLimit;
use crate::stats::Stats;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

/// Default deadline covering a handler's entire conversation.
pub const IO_TIMEOUT: Duration = Duration::from_secs(600);

/// Keep-alive probe period, a third of the I/O deadline.
pub const KEEPALIVE_PERIOD: Duration = Duration::from_secs(IO_TIMEOUT.as_secs() / 3);

/// The application side of a TCP daemon.
#[async_trait::async_trait]
pub trait TcpApp: Send + Sync {
    /// Collector that handler wall times are observed into.
    fn tcp_stats(&self) -> Arc<Stats>;

    /// Converse over one accepted connection. The scaffolding aborts the
    /// handler once [`IO_TIMEOUT`] elapses; a handler that needs longer
    /// must finish its business in multiple connections.
    async fn handle_tcp_connection(&self, logger: &Logger, client_ip: IpAddr, stream: TcpStream);
}

/// Accepts connections on `listen_addr:listen_port` and dispatches each to
/// the application on its own task.
pub struct TcpServer {
    listen_addr: String,
    listen_port: u16,
    app: Arc<dyn TcpApp>,
    ctx: Arc<ProcessContext>,
    limiter: RateLimit,
    logger: Logger,
    started: AtomicBool,
    shutdown: Notify,
    local_port: AtomicU16,
}

impl TcpServer {
    pub fn new(
        ctx: Arc<ProcessContext>,
        app: Arc<dyn TcpApp>,
        listen_addr: impl Into<String>,
        listen_port: u16,
        limit_per_sec: u64,
    ) -> Self {
        let listen_addr = listen_addr.into();
        let logger = Logger::new("tcpserver", format!("{listen_addr}:{listen_port}"));
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

    /// Port actually bound; differs from the configured one when that was 0.
    pub fn local_port(&self) -> u16 {
        self.local_port.load(Ordering::SeqCst)
    }

    /// Lets a handler consume additional rate-limit tokens mid-conversation.
    pub fn add_and_check_rate_limit(&self, client_ip: IpAddr) -> bool {
        self.limiter.add(&client_ip.to_string(), true)
    }

    /// Run the accept loop until [`Self::stop`] or emergency lock-down.
    /// Not reentrant: a second call fails with `AlreadyStarted`.
    pub async fn start_and_block(&self) -> Result<(), ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }
        let listener = TcpListener::bind((self.listen_addr.as_str(), self.listen_port)).await?;
        self.local_port
            .store(listener.local_addr()?.port(), Ordering::SeqCst);
        self.logger.info("start", "accepting connections");
        loop {
            if self.ctx.is_locked_down() {
                return Err(ServerError::EmergencyLockDown);
            }
            let (stream, peer) = tokio::select! {
                _ = self.shutdown.notified() => {
                    self.logger.info("stop", "listener closed");
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(err) if err.to_string().contains("closed") => return Ok(()),
                    Err(err) => return Err(err.into()),
                },
            };
            let client_ip = peer.ip();
            if !self.limiter.add(&client_ip.to_string(), true) {
                self.logger
                    .info("accept", format!("rate limit dropped {client_ip}"));
                continue;
            }
            let keepalive = socket2::TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
            if let Err(err) = socket2::SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
                self.logger
                    .warn("accept", &err, "failed to enable keep-alive");
            }
            let app = self.app.clone();
            let logger = self.logger.clone();
            tokio::spawn(async move {
                let stats = app.tcp_stats();
                let started = Instant::now();
                if tokio::time::timeout(
                    IO_TIMEOUT,
                    app.handle_tcp_connection(&logger, client_ip, stream),
                )
                .await
                .is_err()
                {
                    logger.info(
                        "handle",
                        format!("connection from {client_ip} exceeded the I/O deadline"),
                    );
                }
                stats.observe(started.elapsed().as_millis() as f64);
            });
        }
    }

    /// Close the listener. Idempotent; safe before, during and after the
    /// accept loop.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}
