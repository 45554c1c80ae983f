//! The command execution pipeline shared by every daemon.

use crate::context::ProcessContext;
use crate::filter::{CommandFilter, LintText, ResultFilter};
use crate::logger::Logger;
use crate::ratelimit::RateLimit;
use crate::toolbox::{
    Command, CmdError, CommandResult, FeatureSet, SENSITIVE_CONTENT_PLACEHOLDER, TRIGGER_DECRYPT,
    TRIGGER_TWOFA,
};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;

/// Ceiling on `MaxCmdPerSec` applied when the user leaves it unconfigured.
pub const MAX_CMD_PER_SEC_HARD_LIMIT: u64 = 1000;

/// Minimum password length acceptable on an Internet-facing pipeline.
pub const MIN_PASSWORD_LENGTH: usize = 7;

/// Acceptable lint window for an Internet-facing pipeline.
pub const LINT_LENGTH_FLOOR: usize = 35;
pub const LINT_LENGTH_CEILING: usize = 4096;

/// In-band override header: `.plt <begin> <length> <timeout> <command>`.
pub const PLT_PREFIX: &str = ".plt";

fn plt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^[^0-9]*([0-9]+)[^0-9]+([0-9]+)[^0-9]+([0-9]+)(.*)$")
            .expect("PLT pattern is a valid regex")
    })
}

/// A configuration defect that makes a pipeline unsafe or unusable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration is unsafe for the Internet: {0}")]
    Unsafe(String),
    #[error("{0}")]
    Invalid(String),
}

/// Authenticates, rewrites, dispatches and post-processes one [`Command`]
/// at a time. Filter and feature state is immutable after construction;
/// the per-pipeline rate limiter is the only shared mutable state, so the
/// processor is freely shared across daemon tasks behind an `Arc`.
pub struct CommandProcessor {
    ctx: Arc<ProcessContext>,
    features: FeatureSet,
    command_filters: Vec<CommandFilter>,
    result_filters: Vec<ResultFilter>,
    rate_limit: RateLimit,
    logger: Logger,
}

impl CommandProcessor {
    /// `max_cmd_per_sec` of zero means unconfigured; a hard ceiling applies
    /// either way.
    pub fn new(
        ctx: Arc<ProcessContext>,
        features: FeatureSet,
        command_filters: Vec<CommandFilter>,
        result_filters: Vec<ResultFilter>,
        max_cmd_per_sec: u64,
    ) -> Self {
        let quota = match max_cmd_per_sec {
            0 => MAX_CMD_PER_SEC_HARD_LIMIT,
            n => n.min(MAX_CMD_PER_SEC_HARD_LIMIT),
        };
        Self {
            ctx,
            features,
            command_filters,
            result_filters,
            rate_limit: RateLimit::new(1, quota),
            logger: Logger::new("processor", ""),
        }
    }

    pub fn set_logger(&mut self, logger: Logger) {
        self.logger = logger;
    }

    /// True when no password and no shortcut whatsoever are configured.
    pub fn is_empty(&self) -> bool {
        !self.command_filters.iter().any(|f| {
            matches!(f, CommandFilter::PinAndShortcuts(pin) if !pin.is_empty())
        })
    }

    /// Defects that must block an Internet-facing daemon from starting.
    /// Not consulted by [`Self::process`]; callers decide.
    pub fn is_sane_for_internet(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.features.is_empty() {
            errors.push(ConfigError::Unsafe(
                "no features are configured".to_string(),
            ));
        }
        match self.command_filters.iter().find_map(|f| match f {
            CommandFilter::PinAndShortcuts(pin) => Some(pin),
            _ => None,
        }) {
            None => errors.push(ConfigError::Unsafe(
                "password and shortcut authentication is not configured".to_string(),
            )),
            Some(pin) => {
                if pin.pin.len() < MIN_PASSWORD_LENGTH && pin.shortcuts.is_empty() {
                    errors.push(ConfigError::Unsafe(format!(
                        "password must be at least {MIN_PASSWORD_LENGTH} characters or shortcuts must be defined"
                    )));
                }
            }
        }
        match self.find_lint_filter() {
            None => errors.push(ConfigError::Unsafe(
                "text linting is not configured".to_string(),
            )),
            Some(lint) => {
                if lint.max_length < LINT_LENGTH_FLOOR || lint.max_length > LINT_LENGTH_CEILING {
                    errors.push(ConfigError::Unsafe(format!(
                        "lint maximum length must be within [{LINT_LENGTH_FLOOR}, {LINT_LENGTH_CEILING}]"
                    )));
                }
            }
        }
        errors
    }

    fn find_lint_filter(&self) -> Option<&LintText> {
        self.result_filters.iter().find_map(|f| match f {
            ResultFilter::LintText(lint) => Some(lint),
            _ => None,
        })
    }

    /// Run the full pipeline over one command. Failures come back as the
    /// result's error value, never as a panic. Daemons serving a wire
    /// protocol pass `run_result_filters` true; internal callers such as
    /// the recurring engine pass false to skip linting and notification.
    pub async fn process(&self, cmd: Command, run_result_filters: bool) -> CommandResult {
        if self.ctx.is_locked_down() {
            return CommandResult::from_error(cmd, CmdError::EmergencyLockDown);
        }
        if !self.rate_limit.add(&cmd.client_tag, true) {
            return CommandResult::from_error(cmd, CmdError::RateLimitExceeded);
        }
        let started = Instant::now();
        let result = self.run_pipeline(cmd, run_result_filters).await;
        self.ctx
            .cmd_duration
            .observe(started.elapsed().as_millis() as f64);
        result
    }

    async fn run_pipeline(&self, original: Command, run_result_filters: bool) -> CommandResult {
        let mut cmd = original;
        let mut plt_lint: Option<LintText> = None;
        let mut result = 'assemble: {
            for filter in &self.command_filters {
                match filter.transform(&cmd) {
                    Ok(next) => cmd = next,
                    Err(err) => break 'assemble CommandResult::from_error(cmd, err),
                }
            }
            cmd.content = cmd.content.trim().to_string();
            if cmd.content.is_empty() {
                break 'assemble CommandResult::from_error(cmd, CmdError::EmptyCommand);
            }
            if cmd.content.starts_with(PLT_PREFIX) {
                let rest = cmd.content[PLT_PREFIX.len()..].to_string();
                let Some(lint) = self.find_lint_filter() else {
                    break 'assemble CommandResult::from_error(cmd, CmdError::BadPlt);
                };
                let (begin, length, timeout, trailing) = match parse_plt(&rest) {
                    Ok(parts) => parts,
                    Err(err) => break 'assemble CommandResult::from_error(cmd, err),
                };
                plt_lint = Some(lint.with_window(begin, length));
                cmd.timeout_sec = timeout;
                cmd.content = trailing;
            }
            let Some((feature, remainder)) = self.features.lookup(&cmd.content) else {
                break 'assemble CommandResult::from_error(cmd, CmdError::BadPrefix);
            };
            // Snapshot for logging and the result echo; secret-bearing
            // triggers never reach either verbatim.
            let log_content = match feature.trigger() {
                TRIGGER_DECRYPT | TRIGGER_TWOFA => SENSITIVE_CONTENT_PLACEHOLDER.to_string(),
                _ => cmd.content.clone(),
            };
            self.logger.info(
                "process",
                format!(
                    "executing \"{log_content}\" for daemon \"{}\"",
                    cmd.daemon_name
                ),
            );
            let mut exec_cmd = cmd.clone();
            exec_cmd.content = remainder.trim().to_string();
            let outcome = feature.execute(&exec_cmd).await;
            cmd.content = log_content;
            CommandResult {
                command: cmd,
                output: outcome.output,
                error: outcome.error,
                combined_output: String::new(),
            }
        };
        result.reset_combined_text();
        if run_result_filters {
            for filter in &self.result_filters {
                let outcome = match (filter, &plt_lint) {
                    (ResultFilter::LintText(_), Some(lint)) => lint.transform(&mut result),
                    _ => filter.transform(&mut result),
                };
                if let Err(err) = outcome {
                    result.error = Some(err);
                    result.reset_combined_text();
                    break;
                }
            }
        }
        result
    }
}

/// Split `<begin> <length> <timeout> <command>` out of the text following
/// the PLT prefix. The three integers may be separated by any non-digit
/// noise; the timeout must be positive and a command must remain.
fn parse_plt(rest: &str) -> Result<(usize, usize, u64, String), CmdError> {
    let captures = plt_regex().captures(rest).ok_or(CmdError::BadPlt)?;
    let begin: usize = captures[1].parse().map_err(|_| CmdError::BadPlt)?;
    let length: usize = captures[2].parse().map_err(|_| CmdError::BadPlt)?;
    let timeout: u64 = captures[3].parse().map_err(|_| CmdError::BadPlt)?;
    if timeout == 0 {
        return Err(CmdError::BadPlt);
    }
    let trailing = captures[4].trim().to_string();
    if trailing.is_empty() {
        return Err(CmdError::BadPlt);
    }
    Ok((begin, length, timeout, trailing))
}
