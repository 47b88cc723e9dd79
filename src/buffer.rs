use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default number of values a batching stage holds between flushes
pub const DEFAULT_CAPACITY: usize = 10;

/// Determines how the buffer should handle a push when it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest held value to make room for the new one
    #[default]
    DropOldest,
    /// Keep the held values and discard the incoming one
    DropNewest,
}

/// A fixed-capacity buffer shared between a producer and a periodic drainer.
///
/// State and lock live together; the storage is never handed out. Values
/// are kept in a `VecDeque`, so overflow costs O(1) instead of shifting
/// every element, and [`CircularBuffer::drain`] still yields them oldest
/// to newest.
#[derive(Debug)]
pub struct CircularBuffer<T> {
    slots: Arc<Mutex<VecDeque<T>>>,
    capacity: usize,
    policy: OverflowPolicy,
    displaced_count: Arc<AtomicU64>,
}

impl<T> Clone for CircularBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
            capacity: self.capacity,
            policy: self.policy,
            displaced_count: Arc::clone(&self.displaced_count),
        }
    }
}

impl<T> CircularBuffer<T> {
    /// Create a buffer that evicts the oldest value on overflow
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, OverflowPolicy::DropOldest)
    }

    /// Create a buffer with the specified capacity and overflow policy
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_policy(capacity: usize, policy: OverflowPolicy) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        Self {
            slots: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            policy,
            displaced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Insert a value.
    ///
    /// Returns the value that lost its place because the buffer was full:
    /// the evicted oldest value under `DropOldest`, or `value` itself under
    /// `DropNewest`. Returns `None` when there was room.
    pub fn push(&self, value: T) -> Option<T> {
        let mut slots = self.slots.lock();
        if slots.len() < self.capacity {
            slots.push_back(value);
            return None;
        }

        self.displaced_count.fetch_add(1, Ordering::Relaxed);
        match self.policy {
            OverflowPolicy::DropOldest => {
                let evicted = slots.pop_front();
                slots.push_back(value);
                evicted
            }
            OverflowPolicy::DropNewest => Some(value),
        }
    }

    /// Take every held value, oldest first, leaving the buffer empty.
    ///
    /// Returns `None` when nothing was held, never an empty `Vec`.
    pub fn drain(&self) -> Option<Vec<T>> {
        let mut slots = self.slots.lock();
        if slots.is_empty() {
            return None;
        }
        Some(slots.drain(..).collect())
    }

    /// Get the number of values currently held
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Get the capacity of the buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Get the number of values lost to the overflow policy
    pub fn displaced_count(&self) -> u64 {
        self.displaced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_drain_in_order() {
        let buffer = CircularBuffer::new(DEFAULT_CAPACITY);
        for i in 1..=4 {
            assert_eq!(buffer.push(i), None);
        }
        assert_eq!(buffer.drain(), Some(vec![1, 2, 3, 4]));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_empty_returns_none() {
        let buffer: CircularBuffer<i64> = CircularBuffer::new(3);
        assert_eq!(buffer.drain(), None);

        buffer.push(7);
        assert_eq!(buffer.drain(), Some(vec![7]));
        assert_eq!(buffer.drain(), None);
    }

    #[test]
    fn test_drop_oldest_policy() {
        let buffer = CircularBuffer::new(3);
        for i in 1..=3 {
            buffer.push(i);
        }
        assert_eq!(buffer.push(4), Some(1));
        assert_eq!(buffer.push(5), Some(2));
        assert_eq!(buffer.displaced_count(), 2);
        assert_eq!(buffer.drain(), Some(vec![3, 4, 5]));
    }

    #[test]
    fn test_drop_newest_policy() {
        let buffer = CircularBuffer::with_policy(2, OverflowPolicy::DropNewest);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.push(3), Some(3));
        assert_eq!(buffer.displaced_count(), 1);
        assert_eq!(buffer.drain(), Some(vec![1, 2]));
    }

    #[test]
    fn test_wraps_after_drain() {
        let buffer = CircularBuffer::new(2);
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        assert_eq!(buffer.drain(), Some(vec![2, 3]));
        buffer.push(4);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.drain(), Some(vec![4]));
    }

    #[test]
    fn test_capacity() {
        let buffer: CircularBuffer<i64> = CircularBuffer::new(42);
        assert_eq!(buffer.capacity(), 42);
        assert_eq!(buffer.policy(), OverflowPolicy::DropOldest);
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn test_zero_capacity_panics() {
        let _ = CircularBuffer::<i64>::new(0);
    }
}
