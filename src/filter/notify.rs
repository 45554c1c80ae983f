//! Fire-and-forget mail notification about processed commands.

use crate::mailer::Mailer;
use crate::toolbox::{CmdError, CommandResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Sends a note about the command and its result to the configured
/// recipients. Delivery happens on a detached task; failures are logged
/// and never fail the pipeline.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NotifyViaEmail {
    pub recipients: Vec<String>,
    #[serde(skip)]
    mailer: Option<Arc<dyn Mailer>>,
}

impl std::fmt::Debug for NotifyViaEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyViaEmail")
            .field("recipients", &self.recipients)
            .field("mailer", &self.mailer.is_some())
            .finish()
    }
}

impl NotifyViaEmail {
    pub fn set_mailer(&mut self, mailer: Arc<dyn Mailer>) {
        self.mailer = Some(mailer);
    }

    pub fn is_configured(&self) -> bool {
        self.mailer.is_some() && !self.recipients.is_empty()
    }

    pub fn transform(&self, result: &mut CommandResult) -> Result<(), CmdError> {
        let Some(mailer) = self.mailer.clone() else {
            return Ok(());
        };
        if self.recipients.is_empty() {
            return Ok(());
        }
        let recipients = self.recipients.clone();
        let subject = format!(
            "outpost command processed for daemon \"{}\"",
            result.command.daemon_name
        );
        let body = format!(
            "{}\n\n{}",
            result.command.content, result.combined_output
        );
        tokio::spawn(async move {
            if let Err(err) = mailer.send(&subject, &body, &recipients).await {
                warn!("failed to send command notification: {err}");
            }
        });
        Ok(())
    }
}
