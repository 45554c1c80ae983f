//! The toolbox: the unit of work, the unit of response, and the features a
//! command can be dispatched to.

pub mod decrypt;
pub mod info;
pub mod shell;
pub mod twofa;

pub use decrypt::TextDecrypt;
pub use info::RuntimeInfo;
pub use shell::RunShell;
pub use twofa::TwoFACodes;

use thiserror::Error;

pub const TRIGGER_SHELL: &str = ".s";
pub const TRIGGER_TWOFA: &str = ".2";
pub const TRIGGER_DECRYPT: &str = ".a";
pub const TRIGGER_INFO: &str = ".e";

/// Stand-in recorded instead of the real content when a command carries
/// secret material, so secrets never reach logs or result echoes.
pub const SENSITIVE_CONTENT_PLACEHOLDER: &str = "(sensitive content hidden)";

/// The unit of work fed to the command processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    pub content: String,
    /// Upper bound on feature execution, seconds. Always positive.
    pub timeout_sec: u64,
    /// Daemon tag for logging and statistics.
    pub daemon_name: String,
    /// Key for per-client rate limiting; often the client IP.
    pub client_tag: String,
}

impl Command {
    pub fn new(content: impl Into<String>, timeout_sec: u64) -> Self {
        Self {
            content: content.into(),
            timeout_sec,
            ..Self::default()
        }
    }

    pub fn trimmed(&self) -> &str {
        self.content.trim()
    }
}

/// Failure kinds surfaced as values on a [`CommandResult`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CmdError {
    #[error("invalid PIN or shortcut")]
    AuthenticationFailed,
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("emergency lock-down is in effect")]
    EmergencyLockDown,
    #[error("empty command")]
    EmptyCommand,
    #[error("bad prefix or feature is not configured")]
    BadPrefix,
    #[error("bad PLT format, usage: .plt <begin> <length> <timeout> <command>")]
    BadPlt,
    #[error("{0}")]
    FeatureFailure(String),
}

/// The unit of response from the command processor.
#[derive(Debug, Clone, Default)]
pub struct CommandResult {
    /// Echo of the processed command; `content` holds the log-safe text.
    pub command: Command,
    pub output: String,
    pub error: Option<CmdError>,
    /// Canonical single-string representation, recomputed after the last
    /// result filter so callers never observe a stale concatenation.
    pub combined_output: String,
}

impl CommandResult {
    pub fn from_error(command: Command, error: CmdError) -> Self {
        let mut result = Self {
            command,
            error: Some(error),
            ..Self::default()
        };
        result.reset_combined_text();
        result
    }

    pub fn reset_combined_text(&mut self) {
        self.combined_output = match &self.error {
            Some(err) => format!("{err} ; {}", self.output),
            None => self.output.clone(),
        };
    }
}

/// What a feature hands back: output text plus an optional error. Both may
/// be present, e.g. partial output of a command that ran out of time.
#[derive(Debug, Default)]
pub struct FeatureResult {
    pub output: String,
    pub error: Option<CmdError>,
}

impl FeatureResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    pub fn err(error: CmdError) -> Self {
        Self {
            output: String::new(),
            error: Some(error),
        }
    }
}

/// A domain-specific action keyed by a short trigger prefix.
#[async_trait::async_trait]
pub trait Feature: Send + Sync {
    fn trigger(&self) -> &'static str;

    /// Verify the feature's configuration without side effects.
    fn self_test(&self) -> Result<(), CmdError>;

    /// Run the action. `cmd.content` arrives with the trigger stripped.
    async fn execute(&self, cmd: &Command) -> FeatureResult;
}

/// Ordered mapping from trigger prefix to feature.
#[derive(Default)]
pub struct FeatureSet {
    features: Vec<Box<dyn Feature>>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Triggers must be unique across the set.
    pub fn install(&mut self, feature: Box<dyn Feature>) -> Result<(), CmdError> {
        if self.features.iter().any(|f| f.trigger() == feature.trigger()) {
            return Err(CmdError::FeatureFailure(format!(
                "duplicate feature trigger {}",
                feature.trigger()
            )));
        }
        self.features.push(feature);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// First feature whose trigger prefixes `content`, along with the
    /// content after the trigger.
    pub fn lookup<'a>(&self, content: &'a str) -> Option<(&dyn Feature, &'a str)> {
        self.features
            .iter()
            .find(|f| content.starts_with(f.trigger()))
            .map(|f| (f.as_ref(), &content[f.trigger().len()..]))
    }

    pub fn self_test(&self) -> Vec<CmdError> {
        self.features
            .iter()
            .filter_map(|f| f.self_test().err())
            .collect()
    }
}
