//! Plain TCP/UDP command daemon.
//!
//! The simplest wire protocol of the host: every newline-terminated line
//! (or datagram) is a command for the shared pipeline, and the combined
//! output goes straight back. One application struct serves both
//! transports.

use super::Daemon;
use crate::context::ProcessContext;
use crate::logger::Logger;
use crate::net::{ServerError, TcpApp, TcpServer, UdpApp, UdpServer};
use crate::processor::{CommandProcessor, ConfigError};
use crate::ratelimit::RateLimit;
use crate::stats::Stats;
use crate::toolbox::Command;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinSet;

/// Lines longer than this close the conversation.
pub const MAX_COMMAND_LENGTH: usize = 4096;

pub const DEFAULT_CMD_TIMEOUT_SEC: u64 = 30;
pub const DEFAULT_PER_IP_LIMIT: u64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PlainSocketConfig {
    pub listen_address: String,
    /// Port 0 binds an ephemeral port; absent disables the transport.
    #[serde(rename = "TCPPort")]
    pub tcp_port: Option<u16>,
    #[serde(rename = "UDPPort")]
    pub udp_port: Option<u16>,
    #[serde(rename = "PerIPLimit")]
    pub per_ip_limit: u64,
    pub cmd_timeout_sec: u64,
}

impl Default for PlainSocketConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            tcp_port: None,
            udp_port: None,
            per_ip_limit: DEFAULT_PER_IP_LIMIT,
            cmd_timeout_sec: DEFAULT_CMD_TIMEOUT_SEC,
        }
    }
}

/// Shared TCP/UDP application: decode text, run the pipeline, encode text.
struct PlainSocketApp {
    processor: Arc<CommandProcessor>,
    cmd_timeout_sec: u64,
    /// Per-line admission on top of the servers' per-accept limiting.
    limiter: RateLimit,
    tcp_stats: Arc<Stats>,
    udp_stats: Arc<Stats>,
}

impl PlainSocketApp {
    async fn run_command(&self, client_ip: IpAddr, line: &str) -> String {
        let cmd = Command {
            content: line.to_string(),
            timeout_sec: self.cmd_timeout_sec,
            daemon_name: "plainsocket".to_string(),
            client_tag: client_ip.to_string(),
        };
        let result = self.processor.process(cmd, true).await;
        result.combined_output
    }
}

#[async_trait::async_trait]
impl TcpApp for PlainSocketApp {
    fn tcp_stats(&self) -> Arc<Stats> {
        self.tcp_stats.clone()
    }

    async fn handle_tcp_connection(&self, logger: &Logger, client_ip: IpAddr, stream: TcpStream) {
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return,
                Err(err) => {
                    logger.warn("converse", &err, "failed to read command line");
                    return;
                }
            };
            if line.len() > MAX_COMMAND_LENGTH {
                logger.info("converse", format!("{client_ip} sent an oversized command"));
                return;
            }
            if line.trim().is_empty() {
                continue;
            }
            if !self.limiter.add(&client_ip.to_string(), true) {
                return;
            }
            let reply = self.run_command(client_ip, &line).await;
            if writer.write_all(reply.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl UdpApp for PlainSocketApp {
    fn udp_stats(&self) -> Arc<Stats> {
        self.udp_stats.clone()
    }

    async fn handle_udp_packet(
        &self,
        logger: &Logger,
        client_ip: IpAddr,
        peer: SocketAddr,
        packet: Vec<u8>,
        socket: Arc<UdpSocket>,
    ) {
        let text = String::from_utf8_lossy(&packet);
        let line = text.trim();
        if line.is_empty() || line.len() > MAX_COMMAND_LENGTH {
            return;
        }
        let mut reply = self.run_command(client_ip, line).await;
        reply.push('\n');
        if let Err(err) = socket.send_to(reply.as_bytes(), peer).await {
            logger.warn("reply", &err, "failed to answer packet");
        }
    }
}

/// The polyglot daemon: both transports, one application, one pipeline.
pub struct PlainSocketDaemon {
    config: PlainSocketConfig,
    processor: Arc<CommandProcessor>,
    ctx: Arc<ProcessContext>,
    tcp_server: Option<Arc<TcpServer>>,
    udp_server: Option<Arc<UdpServer>>,
}

impl PlainSocketDaemon {
    pub fn new(
        ctx: Arc<ProcessContext>,
        processor: Arc<CommandProcessor>,
        config: PlainSocketConfig,
    ) -> Self {
        Self {
            config,
            processor,
            ctx,
            tcp_server: None,
            udp_server: None,
        }
    }

    pub fn tcp_server(&self) -> Option<&Arc<TcpServer>> {
        self.tcp_server.as_ref()
    }

    pub fn udp_server(&self) -> Option<&Arc<UdpServer>> {
        self.udp_server.as_ref()
    }
}

#[async_trait::async_trait]
impl Daemon for PlainSocketDaemon {
    fn name(&self) -> &'static str {
        "plainsocket"
    }

    fn initialise(&mut self) -> Result<(), ConfigError> {
        let defects = self.processor.is_sane_for_internet();
        if !defects.is_empty() {
            let all: Vec<String> = defects.iter().map(|d| d.to_string()).collect();
            return Err(ConfigError::Unsafe(all.join("; ")));
        }
        if self.config.tcp_port.is_none() && self.config.udp_port.is_none() {
            return Err(ConfigError::Invalid(
                "plainsocket needs a TCP port, a UDP port, or both".to_string(),
            ));
        }
        let app = Arc::new(PlainSocketApp {
            processor: self.processor.clone(),
            cmd_timeout_sec: self.config.cmd_timeout_sec.max(1),
            limiter: RateLimit::new(1, self.config.per_ip_limit),
            tcp_stats: Arc::new(Stats::new()),
            udp_stats: Arc::new(Stats::new()),
        });
        if let Some(port) = self.config.tcp_port {
            self.tcp_server = Some(Arc::new(TcpServer::new(
                self.ctx.clone(),
                app.clone(),
                self.config.listen_address.clone(),
                port,
                self.config.per_ip_limit,
            )));
        }
        if let Some(port) = self.config.udp_port {
            self.udp_server = Some(Arc::new(UdpServer::new(
                self.ctx.clone(),
                app.clone(),
                self.config.listen_address.clone(),
                port,
                self.config.per_ip_limit,
            )));
        }
        Ok(())
    }

    /// Runs both transports; the first non-shutdown failure of either loop
    /// stops the other and is returned.
    async fn start_and_block(&self) -> Result<(), ServerError> {
        let mut loops: JoinSet<Result<(), ServerError>> = JoinSet::new();
        if let Some(server) = &self.tcp_server {
            let server = server.clone();
            loops.spawn(async move { server.start_and_block().await });
        }
        if let Some(server) = &self.udp_server {
            let server = server.clone();
            loops.spawn(async move { server.start_and_block().await });
        }
        while let Some(joined) = loops.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.stop();
                    return Err(err);
                }
                Err(err) => {
                    self.stop();
                    return Err(ServerError::Io(std::io::Error::other(err)));
                }
            }
        }
        Ok(())
    }

    fn stop(&self) {
        if let Some(server) = &self.tcp_server {
            server.stop();
        }
        if let Some(server) = &self.udp_server {
            server.stop();
        }
    }
}
