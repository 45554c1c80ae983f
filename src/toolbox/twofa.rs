//! Rotating-code lookup for named 2FA secrets.

use super::{Command, CmdError, Feature, FeatureResult, TRIGGER_TWOFA};
use crate::totp;
use std::collections::HashMap;

/// Returns the previous, current and next rotating code of a secret named
/// in the command content. The content is secret-adjacent, so the command
/// processor hides it from logs for this trigger.
#[derive(Default)]
pub struct TwoFACodes {
    /// Account name to shared secret.
    pub secrets: HashMap<String, String>,
}

#[async_trait::async_trait]
impl Feature for TwoFACodes {
    fn trigger(&self) -> &'static str {
        TRIGGER_TWOFA
    }

    fn self_test(&self) -> Result<(), CmdError> {
        if self.secrets.is_empty() {
            return Err(CmdError::FeatureFailure(
                "no 2FA secrets are configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, cmd: &Command) -> FeatureResult {
        let account = cmd.trimmed();
        match self.secrets.get(account) {
            Some(secret) => {
                let codes = totp::codes_in_window(secret, totp::unix_now());
                FeatureResult::ok(codes.join(" "))
            }
            None => FeatureResult::err(CmdError::FeatureFailure(format!(
                "2FA account \"{account}\" does not exist"
            ))),
        }
    }
}
