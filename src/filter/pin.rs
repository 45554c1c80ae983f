//! Password and shortcut authentication.

use crate::toolbox::{Command, CmdError};
use crate::totp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The first command filter of every Internet-facing pipeline.
///
/// Every line of the incoming content is scanned in order; the first line
/// that matches wins:
/// - a line equal to a shortcut name is replaced by its expansion;
/// - a line containing the password has the rest of that line become the
///   new content;
/// - a line containing a concatenation of two rotating codes (one derived
///   from the password, one from the password reversed, each within one
///   time step of now) is treated the same way.
///
/// Later lines may still authenticate when earlier ones do not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PinAndShortcuts {
    #[serde(rename = "PIN")]
    pub pin: String,
    pub shortcuts: HashMap<String, String>,
}

impl PinAndShortcuts {
    /// True when neither a password nor any shortcut is configured; such a
    /// pipeline must not face the Internet.
    pub fn is_empty(&self) -> bool {
        self.pin.is_empty() && self.shortcuts.is_empty()
    }

    /// Rotating-code concatenations accepted in place of the password.
    fn accepted_codes(&self, unix_secs: u64) -> Vec<String> {
        if self.pin.is_empty() {
            return Vec::new();
        }
        let reversed: String = self.pin.chars().rev().collect();
        let first = totp::codes_in_window(&self.pin, unix_secs);
        let second = totp::codes_in_window(&reversed, unix_secs);
        let mut combos = Vec::with_capacity(first.len() * second.len());
        for a in &first {
            for b in &second {
                combos.push(format!("{a}{b}"));
            }
        }
        combos
    }

    pub fn transform(&self, cmd: &Command) -> Result<Command, CmdError> {
        let codes = self.accepted_codes(totp::unix_now());
        for line in cmd.content.lines() {
            if let Some(expansion) = self.shortcuts.get(line.trim()) {
                let mut out = cmd.clone();
                out.content = expansion.clone();
                return Ok(out);
            }
            if self.pin.is_empty() {
                continue;
            }
            if let Some(idx) = line.find(&self.pin) {
                let mut out = cmd.clone();
                out.content = line[idx + self.pin.len()..].to_string();
                return Ok(out);
            }
            for code in &codes {
                if let Some(idx) = line.find(code.as_str()) {
                    let mut out = cmd.clone();
                    out.content = line[idx + code.len()..].to_string();
                    return Ok(out);
                }
            }
        }
        Err(CmdError::AuthenticationFailed)
    }
}
