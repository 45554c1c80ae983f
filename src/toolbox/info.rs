//! Host runtime report.

use super::{Command, CmdError, Feature, FeatureResult, TRIGGER_INFO};
use crate::context::ProcessContext;
use std::sync::Arc;

/// Reports process uptime and the command duration statistics.
pub struct RuntimeInfo {
    ctx: Arc<ProcessContext>,
}

impl RuntimeInfo {
    pub fn new(ctx: Arc<ProcessContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait::async_trait]
impl Feature for RuntimeInfo {
    fn trigger(&self) -> &'static str {
        TRIGGER_INFO
    }

    fn self_test(&self) -> Result<(), CmdError> {
        Ok(())
    }

    async fn execute(&self, _cmd: &Command) -> FeatureResult {
        FeatureResult::ok(format!(
            "uptime: {} secs\ncommand duration secs: {}",
            self.ctx.uptime().as_secs(),
            self.ctx.cmd_duration.summary(1000.0, 3),
        ))
    }
}
