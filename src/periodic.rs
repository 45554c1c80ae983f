//! Fixed-interval execution of a bounded-range function, forever.

use rand::seq::SliceRandom;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PeriodicError {
    #[error("interval must be at least one second")]
    BadInterval,
    #[error("range must cover at least one integer")]
    BadRange,
    #[error("periodic task is already running")]
    AlreadyRunning,
}

/// Invokes a function with every integer of `0..range`, one invocation per
/// `interval`, round after round without end.
///
/// Options: `random_order` shuffles the integer sequence of each round;
/// `rapid_first_round` runs the whole first round back to back without the
/// interval wait; `stable_interval` subtracts the function's own run time
/// from the next wait so invocations start `interval` apart.
pub struct Periodic {
    pub interval: Duration,
    pub range: usize,
    pub rapid_first_round: bool,
    pub random_order: bool,
    pub stable_interval: bool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Periodic {
    pub fn new(interval: Duration, range: usize) -> Self {
        Self {
            interval,
            range,
            rapid_first_round: false,
            random_order: false,
            stable_interval: false,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the loop. The function receives `(round, integer)` and its
    /// errors are logged without ending the loop.
    pub fn start<F, Fut>(&self, mut func: F) -> Result<(), PeriodicError>
    where
        F: FnMut(u64, usize) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), String>> + Send,
    {
        if self.interval < Duration::from_secs(1) {
            return Err(PeriodicError::BadInterval);
        }
        if self.range == 0 {
            return Err(PeriodicError::BadRange);
        }
        let mut slot = self.handle.lock().unwrap();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return Err(PeriodicError::AlreadyRunning);
        }
        let (interval, range) = (self.interval, self.range);
        let (rapid, random, stable) = (self.rapid_first_round, self.random_order, self.stable_interval);
        *slot = Some(tokio::spawn(async move {
            let mut round: u64 = 0;
            let mut last_run = Duration::ZERO;
            loop {
                let mut order: Vec<usize> = (0..range).collect();
                if random {
                    order.shuffle(&mut rand::thread_rng());
                }
                for i in order {
                    if !(rapid && round == 0) {
                        let wait = if stable {
                            interval.saturating_sub(last_run)
                        } else {
                            interval
                        };
                        tokio::time::sleep(wait).await;
                    }
                    let started = Instant::now();
                    if let Err(err) = func(round, i).await {
                        warn!(round, integer = i, "periodic function failed: {err}");
                    }
                    last_run = started.elapsed();
                }
                round += 1;
            }
        }));
        Ok(())
    }

    /// Abort the loop. Safe to call any number of times, running or not.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for Periodic {
    fn drop(&mut self) {
        self.stop();
    }
}
