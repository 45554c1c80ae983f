//! The lifecycle contract every daemon implements.

pub mod plainsocket;

pub use plainsocket::{PlainSocketConfig, PlainSocketDaemon};

use crate::net::ServerError;
use crate::processor::ConfigError;

/// Initialise, serve, stop. `start_and_block` may be called at most once
/// per initialised instance and runs until `stop` or a fatal error; `stop`
/// is safe to call zero, one or many times.
#[async_trait::async_trait]
pub trait Daemon: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate configuration and prepare listeners. A pipeline that is
    /// unsafe for the Internet blocks initialisation here.
    fn initialise(&mut self) -> Result<(), ConfigError>;

    async fn start_and_block(&self) -> Result<(), ServerError>;

    fn stop(&self);
}
