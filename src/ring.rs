//! Fixed-capacity circular index arithmetic.
//!
//! `RingBuffer` tracks where the next write lands and how many slots are occupied. It owns
//! no storage and takes no locks; `ByteQueue` and `ObjectQueue` pair it with their own slot
//! array and guard both with one mutex.
//!
//! The occupied slots are the `count` slots ending at `write_index - 1` (mod capacity).

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RingBuffer {
    capacity: usize,
    write_index: usize,
    count: usize,
}

impl RingBuffer {
    /// `capacity` must be non-zero; owning queues check this before constructing.
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            capacity,
            write_index: 0,
            count: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_full(&self) -> bool {
        self.count == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn free(&self) -> usize {
        self.capacity - self.count
    }

    /// Slot the next write lands in.
    pub fn next_slot(&self) -> usize {
        self.write_index
    }

    /// Slot holding the oldest entry. Meaningless when empty.
    pub fn oldest_slot(&self) -> usize {
        self.occupied_slot_at(0)
    }

    /// Slot of the entry `offset` positions after the oldest one.
    pub fn occupied_slot_at(&self, offset: usize) -> usize {
        debug_assert!(offset < self.capacity);
        (self.write_index + self.capacity - self.count + offset) % self.capacity
    }

    /// Account for `n` writes starting at `next_slot()`. When the writes exceed the free
    /// space the oldest entries are considered overwritten and `count` saturates.
    pub fn advance(&mut self, n: usize) {
        self.write_index = (self.write_index + n) % self.capacity;
        self.count = (self.count + n).min(self.capacity);
    }

    /// Forget the `n` oldest entries.
    pub fn retire(&mut self, n: usize) {
        debug_assert!(n <= self.count);
        self.count -= n.min(self.count);
    }

    pub fn reset(&mut self) {
        self.write_index = 0;
        self.count = 0;
    }
}
