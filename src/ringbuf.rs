//! Bounded FIFO of strings, oldest entry overwritten on overflow.

use std::sync::Mutex;

#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    inner: Mutex<RingInner>,
}

#[derive(Debug)]
struct RingInner {
    slots: Vec<String>,
    pushed: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            inner: Mutex::new(RingInner {
                slots: vec![String::new(); capacity],
                pushed: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, element: impl Into<String>) {
        let mut inner = self.inner.lock().unwrap();
        let idx = (inner.pushed % self.capacity as u64) as usize;
        inner.slots[idx] = element.into();
        inner.pushed += 1;
    }

    /// Consistent point-in-time snapshot, oldest to newest, empty slots
    /// skipped.
    pub fn get_all(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        self.collect(&inner)
    }

    /// Snapshot and clear in one step.
    pub fn drain(&self) -> Vec<String> {
        let mut inner = self.inner.lock().unwrap();
        let all = self.collect(&inner);
        Self::reset(&mut inner);
        all
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        Self::reset(&mut inner);
    }

    fn collect(&self, inner: &RingInner) -> Vec<String> {
        (0..self.capacity as u64)
            .map(|i| ((inner.pushed + i) % self.capacity as u64) as usize)
            .map(|idx| &inner.slots[idx])
            .filter(|s| !s.is_empty())
            .cloned()
            .collect()
    }

    fn reset(inner: &mut RingInner) {
        inner.slots.iter_mut().for_each(String::clear);
        inner.pushed = 0;
    }
}
