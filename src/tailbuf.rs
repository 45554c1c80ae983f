//! Pass-through byte sink that retains only the most recent N bytes.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Absorbs an unbounded byte stream while remembering just the tail, such
/// as the last few KB of a child process's stdout.
#[derive(Debug)]
pub struct TailBuffer {
    capacity: usize,
    inner: Mutex<VecDeque<u8>>,
}

impl TailBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn write(&self, bytes: &[u8]) {
        let mut buf = self.inner.lock().unwrap();
        buf.extend(bytes.iter().copied());
        while buf.len() > self.capacity {
            buf.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The retained tail as text, lossy on invalid UTF-8.
    pub fn retrieve(&self) -> String {
        let buf = self.inner.lock().unwrap();
        let (front, back) = buf.as_slices();
        let mut bytes = Vec::with_capacity(buf.len());
        bytes.extend_from_slice(front);
        bytes.extend_from_slice(back);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_tail() {
        let tail = TailBuffer::new(4);
        tail.write(b"abcdef");
        assert_eq!(tail.retrieve(), "cdef");
        tail.write(b"gh");
        assert_eq!(tail.retrieve(), "efgh");
    }

    #[test]
    fn short_writes_pass_through() {
        let tail = TailBuffer::new(16);
        tail.write(b"hello ");
        tail.write(b"world");
        assert_eq!(tail.retrieve(), "hello world");
    }
}
