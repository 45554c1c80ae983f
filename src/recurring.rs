//! Periodic execution of pre-configured and transient commands.

use crate::periodic::Periodic;
use crate::processor::{CommandProcessor, ConfigError};
use crate::ringbuf::RingBuffer;
use crate::toolbox::Command;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Hard per-invocation timeout, independent of the outer interval.
pub const RECURRING_COMMAND_TIMEOUT_SEC: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct RecurringConfig {
    pub interval_sec: u64,
    pub max_results: usize,
    pub pre_configured_commands: Vec<String>,
}

/// Executes all pre-configured commands, then all transient commands, once
/// per interval, collecting each combined output into a bounded ring.
/// Results are for internal retrieval, so the pipeline runs without its
/// result filters.
pub struct RecurringCommands {
    interval_sec: u64,
    pre_configured: Vec<String>,
    transient: Arc<Mutex<Vec<String>>>,
    results: Arc<RingBuffer>,
    processor: Arc<CommandProcessor>,
    periodic: Periodic,
    running: AtomicBool,
}

impl RecurringCommands {
    pub fn new(
        processor: Arc<CommandProcessor>,
        config: RecurringConfig,
    ) -> Result<Self, ConfigError> {
        if config.interval_sec < 1 {
            return Err(ConfigError::Invalid(
                "recurring interval must be at least one second".to_string(),
            ));
        }
        if config.max_results < 1 {
            return Err(ConfigError::Invalid(
                "recurring result capacity must be at least one".to_string(),
            ));
        }
        Ok(Self {
            interval_sec: config.interval_sec,
            pre_configured: config.pre_configured_commands,
            transient: Arc::new(Mutex::new(Vec::new())),
            results: Arc::new(RingBuffer::new(config.max_results)),
            processor,
            periodic: Periodic::new(Duration::from_secs(config.interval_sec), 1),
            running: AtomicBool::new(false),
        })
    }

    pub fn interval_sec(&self) -> u64 {
        self.interval_sec
    }

    /// Begin the interval loop. A second call while running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let processor = self.processor.clone();
        let pre_configured = self.pre_configured.clone();
        let transient = self.transient.clone();
        let results = self.results.clone();
        let outcome = self.periodic.start(move |_round, _i| {
            let processor = processor.clone();
            let pre_configured = pre_configured.clone();
            let transient = transient.clone();
            let results = results.clone();
            async move {
                run_all(&processor, &pre_configured, &transient, &results).await;
                Ok(())
            }
        });
        if let Err(err) = outcome {
            warn!("failed to start recurring commands: {err}");
            self.running.store(false, Ordering::SeqCst);
        }
    }

    pub fn stop(&self) {
        self.periodic.stop();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Transient commands run after the pre-configured ones until cleared.
    pub fn add_transient_command(&self, content: impl Into<String>) {
        self.transient.lock().unwrap().push(content.into());
    }

    /// Pre-configured commands are never cleared; this only empties the
    /// transient list.
    pub fn clear_transient_commands(&self) {
        self.transient.lock().unwrap().clear();
    }

    /// Push arbitrary text into the result ring directly.
    pub fn add_arbitrary_text_to_result(&self, text: impl Into<String>) {
        self.results.push(text.into());
    }

    /// All buffered results oldest to newest; the buffer is left empty.
    pub fn get_results(&self) -> Vec<String> {
        self.results.drain()
    }
}

async fn run_all(
    processor: &CommandProcessor,
    pre_configured: &[String],
    transient: &Mutex<Vec<String>>,
    results: &RingBuffer,
) {
    let mut commands = pre_configured.to_vec();
    commands.extend(transient.lock().unwrap().iter().cloned());
    for content in commands {
        let cmd = Command {
            content,
            timeout_sec: RECURRING_COMMAND_TIMEOUT_SEC,
            daemon_name: "recurring".to_string(),
            client_tag: String::new(),
        };
        let result = processor.process(cmd, false).await;
        results.push(result.combined_output);
    }
}
