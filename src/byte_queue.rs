//! Byte-oriented circular buffer.
//!
//! `ByteQueue` moves raw octets from a device I/O thread to consumers. Writes never block:
//! when a run does not fit, the oldest bytes are overwritten. A partial frame is useless to
//! a consumer, so there is no reject mode at byte granularity.

use std::sync::{Condvar, Mutex};

use crate::error::QueueError;
use crate::monitor::{wait_for, Timeout};
use crate::ring::RingBuffer;

struct ByteState {
    ring: RingBuffer,
    storage: Vec<u8>,
    closed: bool,
}

/// Bounded, thread-safe byte FIFO with overwrite-oldest semantics.
///
/// Share it between threads with `Arc`. Closing wakes blocked consumers, which then
/// observe `InvalidState`.
pub struct ByteQueue {
    state: Mutex<ByteState>,
    data_ready: Condvar,
    capacity: usize,
}

impl ByteQueue {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidParameter);
        }
        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::OutOfMemory)?;
        storage.resize(capacity, 0);

        log::debug!("ByteQueue: created with capacity {} bytes", capacity);
        Ok(Self {
            state: Mutex::new(ByteState {
                ring: RingBuffer::new(capacity),
                storage,
                closed: false,
            }),
            data_ready: Condvar::new(),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copy `bytes` in, discarding the oldest buffered bytes if they do not fit.
    ///
    /// Only the last `capacity` bytes of an oversized run are kept.
    pub fn enqueue(&self, bytes: &[u8]) -> Result<(), QueueError> {
        let mut guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }
        if bytes.is_empty() {
            return Ok(());
        }

        let run = if bytes.len() > self.capacity {
            &bytes[bytes.len() - self.capacity..]
        } else {
            bytes
        };

        let state = &mut *guard;
        let start = state.ring.next_slot();
        let head = run.len().min(self.capacity - start);
        state.storage[start..start + head].copy_from_slice(&run[..head]);
        state.storage[..run.len() - head].copy_from_slice(&run[head..]);
        state.ring.advance(run.len());
        drop(guard);

        self.data_ready.notify_all();
        Ok(())
    }

    /// Remove up to `out.len()` bytes, oldest first, waiting up to `timeout` for data.
    ///
    /// Returns the number of bytes written to `out`.
    pub fn dequeue_into(&self, out: &mut [u8], timeout: Timeout) -> Result<usize, QueueError> {
        if out.is_empty() {
            return Err(QueueError::InvalidParameter);
        }
        let guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        let mut guard = wait_for(&self.data_ready, guard, timeout, |state| {
            !state.closed && state.ring.is_empty()
        })?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }

        let state = &mut *guard;
        let taken = out.len().min(state.ring.count());
        let start = state.ring.oldest_slot();
        let head = taken.min(self.capacity - start);
        out[..head].copy_from_slice(&state.storage[start..start + head]);
        out[head..taken].copy_from_slice(&state.storage[..taken - head]);
        state.ring.retire(taken);
        Ok(taken)
    }

    /// Remove up to `max_len` bytes, oldest first, waiting up to `timeout` for data.
    pub fn dequeue(&self, max_len: usize, timeout: Timeout) -> Result<Vec<u8>, QueueError> {
        if max_len == 0 {
            return Err(QueueError::InvalidParameter);
        }
        let mut out = vec![0u8; max_len.min(self.capacity)];
        let taken = self.dequeue_into(&mut out, timeout)?;
        out.truncate(taken);
        Ok(out)
    }

    /// Buffered byte count. Advisory: it may be stale by the time the caller acts on it.
    pub fn count(&self) -> Result<usize, QueueError> {
        let guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }
        Ok(guard.ring.count())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Discard buffered bytes, release storage and wake blocked consumers.
    pub fn close(&self) -> Result<(), QueueError> {
        let mut guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }
        let discarded = guard.ring.count();
        guard.ring.reset();
        guard.storage = Vec::new();
        guard.closed = true;
        drop(guard);

        self.data_ready.notify_all();
        log::debug!("ByteQueue: closed, discarded {} buffered bytes", discarded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_rejected() {
        assert_eq!(ByteQueue::new(0).err(), Some(QueueError::InvalidParameter));
    }

    #[test]
    fn overflow_keeps_most_recent_bytes() {
        let queue = ByteQueue::new(8).unwrap();
        queue.enqueue(&[1, 2, 3, 4, 5]).unwrap();
        queue.enqueue(&[6, 7, 8, 9, 10]).unwrap();
        assert_eq!(queue.count().unwrap(), 8);

        let out = queue.dequeue(8, Timeout::Poll).unwrap();
        assert_eq!(out, vec![3, 4, 5, 6, 7, 8, 9, 10]);
        assert_eq!(queue.count().unwrap(), 0);
    }

    #[test]
    fn oversized_run_keeps_its_tail() {
        let queue = ByteQueue::new(4).unwrap();
        queue.enqueue(&[9, 9]).unwrap();
        queue.enqueue(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(queue.dequeue(16, Timeout::Poll).unwrap(), vec![3, 4, 5, 6]);
    }

    #[test]
    fn partial_reads_wrap_around() {
        let queue = ByteQueue::new(5).unwrap();
        queue.enqueue(b"abcd").unwrap();
        assert_eq!(queue.dequeue(3, Timeout::Poll).unwrap(), b"abc".to_vec());
        queue.enqueue(b"efg").unwrap();
        assert_eq!(queue.count().unwrap(), 4);

        let mut out = [0u8; 2];
        assert_eq!(queue.dequeue_into(&mut out, Timeout::Poll).unwrap(), 2);
        assert_eq!(&out, b"de");
        assert_eq!(queue.dequeue(10, Timeout::Poll).unwrap(), b"fg".to_vec());
    }

    #[test]
    fn empty_poll_times_out() {
        let queue = ByteQueue::new(4).unwrap();
        assert_eq!(
            queue.dequeue(4, Timeout::Poll).err(),
            Some(QueueError::Timeout)
        );
        assert_eq!(
            queue.dequeue(0, Timeout::Poll).err(),
            Some(QueueError::InvalidParameter)
        );
    }

    #[test]
    fn closed_queue_rejects_everything() {
        let queue = ByteQueue::new(4).unwrap();
        queue.enqueue(&[1, 2]).unwrap();
        queue.close().unwrap();
        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(&[3]).err(), Some(QueueError::InvalidState));
        assert_eq!(
            queue.dequeue(4, Timeout::Poll).err(),
            Some(QueueError::InvalidState)
        );
        assert_eq!(queue.count().err(), Some(QueueError::InvalidState));
        assert_eq!(queue.close().err(), Some(QueueError::InvalidState));
    }
}
