//! Reusable TCP and UDP server scaffolding.
//!
//! Both servers own the accept loop, per-client-IP rate limiting, I/O
//! deadlines and handler statistics; the application supplies a callback
//! that speaks the actual wire protocol.

pub mod tcp;
pub mod udp;

pub use tcp::{IO_TIMEOUT, TcpApp, TcpServer};
pub use udp::{MAX_PACKET_SIZE, UdpApp, UdpServer};

use thiserror::Error;

/// Failures of an accept loop. A normal shutdown is not one of them: a
/// stopped server returns `Ok(())` from `start_and_block`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("emergency lock-down is in effect")]
    EmergencyLockDown,
    #[error("server has already been started")]
    AlreadyStarted,
    #[error("listener failure: {0}")]
    Io(#[from] std::io::Error),
}
