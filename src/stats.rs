//! Running min/avg/max/total/count statistics over sample streams.

use std::sync::Mutex;

/// Collects non-negative samples and keeps the running lowest, highest,
/// average and total. Negative samples are discarded; a zero sample counts
/// an occurrence without contributing a quantity.
#[derive(Debug, Default)]
pub struct Stats {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default, Clone)]
struct StatsInner {
    count: u64,
    total: f64,
    lowest: Option<f64>,
    highest: f64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, quantity: f64) {
        if quantity < 0.0 {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.count += 1;
        if quantity == 0.0 {
            return;
        }
        inner.total += quantity;
        inner.lowest = Some(match inner.lowest {
            Some(low) => low.min(quantity),
            None => quantity,
        });
        if quantity > inner.highest {
            inner.highest = quantity;
        }
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().unwrap().count
    }

    pub fn total(&self) -> f64 {
        self.inner.lock().unwrap().total
    }

    /// Render `low/avg/high,total(count)`, dividing every quantity by
    /// `divisor` and printing `decimals` fraction digits. This is the one
    /// place stat summaries are formatted; reports elsewhere call it.
    pub fn summary(&self, divisor: f64, decimals: usize) -> String {
        let snapshot = self.inner.lock().unwrap().clone();
        let average = if snapshot.count > 0 {
            snapshot.total / snapshot.count as f64
        } else {
            0.0
        };
        let scale = |q: f64| format!("{:.*}", decimals, q / divisor);
        format!(
            "{}/{}/{},{}({})",
            scale(snapshot.lowest.unwrap_or(0.0)),
            scale(average),
            scale(snapshot.highest),
            scale(snapshot.total),
            snapshot.count,
        )
    }
}
