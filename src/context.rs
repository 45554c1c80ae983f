//! Process-wide runtime context shared by every daemon.

use crate::stats::Stats;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

/// Singletons of the host process: the emergency lock-down flag, the moment
/// the process came up, and the running statistics of command execution
/// durations. One instance is created in `main` and threaded through every
/// constructor instead of living in module state.
pub struct ProcessContext {
    emergency_lock_down: AtomicBool,
    started_at: Instant,
    /// Wall time of every command processed, in milliseconds.
    pub cmd_duration: Stats,
}

impl ProcessContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            emergency_lock_down: AtomicBool::new(false),
            started_at: Instant::now(),
            cmd_duration: Stats::new(),
        })
    }

    /// Make every accept loop and command processor refuse further work.
    /// Written once per event; readers poll without locking.
    pub fn trigger_emergency_lock_down(&self) {
        warn!("emergency lock-down is now in effect, all daemons will refuse further work");
        self.emergency_lock_down.store(true, Ordering::Relaxed);
    }

    pub fn is_locked_down(&self) -> bool {
        self.emergency_lock_down.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
