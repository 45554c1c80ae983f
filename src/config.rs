//! JSON configuration surface and builders.

use crate::context::ProcessContext;
use crate::daemon::PlainSocketConfig;
use crate::filter::{
    CommandFilter, LintText, NotifyViaEmail, PinAndShortcuts, ResultFilter, TranslateSequences,
};
use crate::mailer::{MailConfig, Mailer};
use crate::processor::{CommandProcessor, ConfigError};
use crate::recurring::RecurringConfig;
use crate::toolbox::{Feature, FeatureSet, RunShell, RuntimeInfo, TextDecrypt, TwoFACodes, shell};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ShellConfig {
    pub interpreter_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TwoFAConfig {
    pub secrets: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct TextDecryptConfig {
    pub key_hex: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct FeaturesConfig {
    pub shell: Option<ShellConfig>,
    #[serde(rename = "TwoFA")]
    pub two_fa: Option<TwoFAConfig>,
    pub text_decrypt: Option<TextDecryptConfig>,
    pub runtime_info: bool,
}

/// The shared pipeline: authentication, rewriting and output shaping.
/// The reset-combined-text and say-empty-output steps are not part of the
/// surface; the builder installs them itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct PipelineConfig {
    pub max_cmd_per_sec: u64,
    #[serde(rename = "PINAndShortcuts")]
    pub pin_and_shortcuts: PinAndShortcuts,
    pub translate_sequences: TranslateSequences,
    pub lint_text: LintText,
    pub notify_via_email: NotifyViaEmail,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Config {
    pub command_pipeline: PipelineConfig,
    pub features: FeaturesConfig,
    pub plain_socket_daemon: Option<PlainSocketConfig>,
    pub recurring_commands: Option<RecurringConfig>,
    pub supervisor_notification_recipients: Vec<String>,
    pub mail: MailConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            ConfigError::Invalid(format!("cannot read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|err| {
            ConfigError::Invalid(format!("cannot parse {}: {err}", path.display()))
        })
    }

    pub fn build_feature_set(&self, ctx: &Arc<ProcessContext>) -> Result<FeatureSet, ConfigError> {
        let mut features = FeatureSet::new();
        let mut install = |feature: Box<dyn Feature>| {
            features
                .install(feature)
                .map_err(|err| ConfigError::Invalid(err.to_string()))
        };
        if let Some(cfg) = &self.features.shell {
            let interpreter = if cfg.interpreter_path.is_empty() {
                shell::DEFAULT_INTERPRETER.to_string()
            } else {
                cfg.interpreter_path.clone()
            };
            install(Box::new(RunShell { interpreter }))?;
        }
        if let Some(cfg) = &self.features.two_fa {
            install(Box::new(TwoFACodes {
                secrets: cfg.secrets.clone(),
            }))?;
        }
        if let Some(cfg) = &self.features.text_decrypt {
            install(Box::new(TextDecrypt {
                key_hex: cfg.key_hex.clone(),
            }))?;
        }
        if self.features.runtime_info {
            install(Box::new(RuntimeInfo::new(ctx.clone())))?;
        }
        Ok(features)
    }

    /// Assemble the command processor: configured features, the command
    /// filter chain in canonical order, and the result filter chain with
    /// the implicit steps installed.
    pub fn build_processor(
        &self,
        ctx: Arc<ProcessContext>,
        mailer: Option<Arc<dyn Mailer>>,
    ) -> Result<CommandProcessor, ConfigError> {
        let features = self.build_feature_set(&ctx)?;
        let pipeline = &self.command_pipeline;
        let command_filters = vec![
            CommandFilter::PinAndShortcuts(pipeline.pin_and_shortcuts.clone()),
            CommandFilter::TranslateSequences(pipeline.translate_sequences.clone()),
        ];
        let mut notify = pipeline.notify_via_email.clone();
        if let Some(mailer) = mailer {
            notify.set_mailer(mailer);
        }
        let result_filters = vec![
            ResultFilter::ResetCombinedText,
            ResultFilter::LintText(pipeline.lint_text.clone()),
            ResultFilter::SayEmptyOutput,
            ResultFilter::NotifyViaEmail(notify),
        ];
        Ok(CommandProcessor::new(
            ctx,
            features,
            command_filters,
            result_filters,
            pipeline.max_cmd_per_sec,
        ))
    }
}
