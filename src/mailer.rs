//! Notification mail seam.
//!
//! Actual MTA delivery lives outside this crate; the pipeline's email
//! filter and the supervisor only depend on the [`Mailer`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failure: {0}")]
    Transport(String),
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, body: &str, recipients: &[String])
    -> Result<(), MailError>;
}

/// MTA coordinates used by whichever mailer implementation is wired in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    #[serde(rename = "MTAHost")]
    pub mta_host: String,
    #[serde(rename = "MTAPort")]
    pub mta_port: u16,
    #[serde(rename = "MailFrom")]
    pub mail_from: String,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        !self.mta_host.is_empty() && self.mta_port > 0 && !self.mail_from.is_empty()
    }
}
