//! Ordered request and response transformer chains.
//!
//! A command filter rewrites a [`Command`] before dispatch; a result filter
//! reshapes the [`CommandResult`] afterwards. Filters execute strictly in
//! chain order and the first error short-circuits the rest.

pub mod lint;
pub mod notify;
pub mod pin;
pub mod translate;

pub use lint::LintText;
pub use notify::NotifyViaEmail;
pub use pin::PinAndShortcuts;
pub use translate::TranslateSequences;

use crate::toolbox::{Command, CmdError, CommandResult};

/// Substituted for an all-whitespace combined output so remote callers can
/// tell "ran fine, said nothing" from a dropped response.
pub const EMPTY_OUTPUT_PLACEHOLDER: &str = "EMPTY OUTPUT";

/// Pre-dispatch transformers.
#[derive(Debug, Clone)]
pub enum CommandFilter {
    PinAndShortcuts(PinAndShortcuts),
    TranslateSequences(TranslateSequences),
}

impl CommandFilter {
    pub fn transform(&self, cmd: &Command) -> Result<Command, CmdError> {
        match self {
            Self::PinAndShortcuts(f) => f.transform(cmd),
            Self::TranslateSequences(f) => f.transform(cmd),
        }
    }
}

/// Post-dispatch transformers. `ResetCombinedText` and `SayEmptyOutput`
/// are installed by the pipeline builder, not by user configuration.
#[derive(Debug, Clone)]
pub enum ResultFilter {
    ResetCombinedText,
    LintText(LintText),
    SayEmptyOutput,
    NotifyViaEmail(NotifyViaEmail),
}

impl ResultFilter {
    pub fn transform(&self, result: &mut CommandResult) -> Result<(), CmdError> {
        match self {
            Self::ResetCombinedText => {
                result.reset_combined_text();
                Ok(())
            }
            Self::LintText(f) => f.transform(result),
            Self::SayEmptyOutput => {
                if result.combined_output.trim().is_empty() {
                    result.combined_output = EMPTY_OUTPUT_PLACEHOLDER.to_string();
                }
                Ok(())
            }
            Self::NotifyViaEmail(f) => f.transform(result),
        }
    }
}
