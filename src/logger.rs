//! Structured component/component-id/actor log emitter over `tracing`.

use std::fmt::Display;
use tracing::{info, warn};

/// Identifies the emitting component (e.g. a daemon kind) and instance
/// (e.g. its listen address) on every event. Cheap to clone; handlers
/// receive one per connection or packet.
#[derive(Debug, Clone)]
pub struct Logger {
    component: &'static str,
    component_id: String,
}

impl Logger {
    pub fn new(component: &'static str, component_id: impl Into<String>) -> Self {
        Self {
            component,
            component_id: component_id.into(),
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn info(&self, actor: &str, message: impl AsRef<str>) {
        info!(
            component = self.component,
            id = %self.component_id,
            actor,
            "{}",
            message.as_ref()
        );
    }

    pub fn warn(&self, actor: &str, error: &dyn Display, message: impl AsRef<str>) {
        warn!(
            component = self.component,
            id = %self.component_id,
            actor,
            error = %error,
            "{}",
            message.as_ref()
        );
    }
}
