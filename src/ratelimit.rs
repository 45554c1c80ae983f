//! Per-key fixed-window admission control.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

/// Once the table grows past this many keys, stale windows are pruned on the
/// next insertion so the limiter never grows unboundedly.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u64,
}

/// Admits up to `max_count` hits per key within every `unit_secs` window.
/// A denied caller is never starved: the counter resets as soon as the
/// window has elapsed.
#[derive(Debug)]
pub struct RateLimit {
    pub unit_secs: u64,
    pub max_count: u64,
    counters: Mutex<HashMap<String, Window>>,
}

impl RateLimit {
    pub fn new(unit_secs: u64, max_count: u64) -> Self {
        Self {
            unit_secs: unit_secs.max(1),
            max_count: max_count.max(1),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true when the key is admitted within the current window.
    /// With `consume` false the call only probes without using up a token.
    pub fn add(&self, key: &str, consume: bool) -> bool {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap();
        if counters.len() > PRUNE_THRESHOLD {
            let unit_secs = self.unit_secs;
            counters.retain(|_, w| now.duration_since(w.started).as_secs() < unit_secs);
        }
        let window = counters.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started).as_secs() >= self.unit_secs {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.max_count {
            return false;
        }
        if consume {
            window.count += 1;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_does_not_consume() {
        let limit = RateLimit::new(10, 2);
        assert!(limit.add("k", false));
        assert!(limit.add("k", false));
        assert!(limit.add("k", true));
        assert!(limit.add("k", true));
        assert!(!limit.add("k", false));
    }

    #[test]
    fn keys_are_independent() {
        let limit = RateLimit::new(10, 1);
        assert!(limit.add("a", true));
        assert!(!limit.add("a", true));
        assert!(limit.add("b", true));
    }
}
