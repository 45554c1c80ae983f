//! Bounded set of strings with last-use ordering and eviction.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Keeps at most `capacity` distinct strings. Adding past the capacity
/// evicts the least recently added element; re-adding an existing element
/// refreshes its recency without evicting anything.
#[derive(Debug)]
pub struct LeastRecentlyUsedBuffer {
    capacity: usize,
    inner: Mutex<VecDeque<String>>,
}

impl LeastRecentlyUsedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
        }
    }

    /// Returns `(already_present, evicted)`.
    pub fn add(&self, element: &str) -> (bool, Option<String>) {
        let mut order = self.inner.lock().unwrap();
        if let Some(pos) = order.iter().position(|e| e == element) {
            order.remove(pos);
            order.push_back(element.to_string());
            return (true, None);
        }
        order.push_back(element.to_string());
        if order.len() > self.capacity {
            return (false, order.pop_front());
        }
        (false, None)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.inner.lock().unwrap().iter().any(|e| e == element)
    }

    pub fn remove(&self, element: &str) -> bool {
        let mut order = self.inner.lock().unwrap();
        match order.iter().position(|e| e == element) {
            Some(pos) => {
                order.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
