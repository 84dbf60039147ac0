//! Bounded, blocking, ownership-transferring object ring.
//!
//! `ObjectQueue<T>` hands owned values from producers to consumers:
//! - `enqueue` moves a value in and never blocks.
//! - `dequeue` moves the oldest value out, blocking up to a timeout while empty.
//! - A value the queue discards without returning it (eviction, `clear`, `close`, drop)
//!   is passed to the destructor supplied at construction.
//!
//! Destructors run while the queue lock is held and must not call back into the same queue.

use std::fmt;
use std::str::FromStr;
use std::sync::{Condvar, Mutex};

use serde::Deserialize;

use crate::error::{EnqueueError, QueueError};
use crate::monitor::{wait_for, Timeout};
use crate::ring::RingBuffer;

/// What `enqueue` does when the queue is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowMode {
    /// Reject the new value and hand it back to the caller.
    #[default]
    AvoidDrop,
    /// Destroy the oldest stored value and store the new one in its place.
    DropOldest,
}

impl OverflowMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverflowMode::AvoidDrop => "avoid_drop",
            OverflowMode::DropOldest => "drop_oldest",
        }
    }
}

impl fmt::Display for OverflowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverflowMode {
    type Err = QueueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "avoid_drop" | "avoid-drop" | "avoiddrop" => Ok(OverflowMode::AvoidDrop),
            "drop_oldest" | "drop-oldest" | "dropoldest" => Ok(OverflowMode::DropOldest),
            _ => Err(QueueError::InvalidParameter),
        }
    }
}

type Destructor<T> = Box<dyn Fn(T) + Send + Sync>;

struct ObjectState<T> {
    ring: RingBuffer,
    slots: Vec<Option<T>>,
    closed: bool,
}

impl<T> ObjectState<T> {
    /// Destroy every stored value, oldest to newest. Returns how many were destroyed.
    fn drain(&mut self, destructor: &Option<Destructor<T>>) -> usize {
        let pending = self.ring.count();
        for offset in 0..pending {
            let slot = self.ring.occupied_slot_at(offset);
            if let Some(item) = self.slots[slot].take() {
                discard(destructor, item);
            }
        }
        self.ring.reset();
        pending
    }
}

fn discard<T>(destructor: &Option<Destructor<T>>, item: T) {
    match destructor {
        Some(destroy) => destroy(item),
        None => drop(item),
    }
}

/// Thread-safe FIFO of owned values with a fixed capacity.
///
/// Share it between threads with `Arc`. Closing wakes blocked consumers, which then
/// observe `InvalidState`.
pub struct ObjectQueue<T> {
    state: Mutex<ObjectState<T>>,
    data_ready: Condvar,
    capacity: usize,
    mode: OverflowMode,
    destructor: Option<Destructor<T>>,
}

impl<T> ObjectQueue<T> {
    /// Create a queue whose discarded values are simply dropped.
    pub fn new(capacity: usize, mode: OverflowMode) -> Result<Self, QueueError> {
        Self::build(capacity, mode, None)
    }

    /// Create a queue that passes every discarded value to `destructor`.
    pub fn with_destructor<F>(
        capacity: usize,
        mode: OverflowMode,
        destructor: F,
    ) -> Result<Self, QueueError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(capacity, mode, Some(Box::new(destructor)))
    }

    fn build(
        capacity: usize,
        mode: OverflowMode,
        destructor: Option<Destructor<T>>,
    ) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidParameter);
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::OutOfMemory)?;
        slots.resize_with(capacity, || None);

        log::debug!("ObjectQueue: created with capacity {} ({})", capacity, mode);
        Ok(Self {
            state: Mutex::new(ObjectState {
                ring: RingBuffer::new(capacity),
                slots,
                closed: false,
            }),
            data_ready: Condvar::new(),
            capacity,
            mode,
            destructor,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn mode(&self) -> OverflowMode {
        self.mode
    }

    /// Store `item`, transferring ownership to the queue.
    ///
    /// When the queue is full, an `AvoidDrop` queue returns `QueueFull` with the item
    /// inside the error. A `DropOldest` queue destroys its oldest value and stores the new
    /// one in the same critical section. A closed queue returns `InvalidState`, also
    /// handing the item back.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => return Err(EnqueueError::new(QueueError::InvalidState, item)),
        };
        if guard.closed {
            return Err(EnqueueError::new(QueueError::InvalidState, item));
        }

        let state = &mut *guard;
        if state.ring.is_full() {
            match self.mode {
                OverflowMode::AvoidDrop => {
                    return Err(EnqueueError::new(QueueError::QueueFull, item));
                }
                OverflowMode::DropOldest => {
                    let oldest = state.ring.oldest_slot();
                    if let Some(evicted) = state.slots[oldest].take() {
                        discard(&self.destructor, evicted);
                    }
                    state.ring.retire(1);
                }
            }
        }

        let slot = state.ring.next_slot();
        state.slots[slot] = Some(item);
        state.ring.advance(1);
        drop(guard);

        self.data_ready.notify_one();
        Ok(())
    }

    /// Remove and return the oldest value, waiting up to `timeout` while empty.
    ///
    /// On `Timeout` the queue is unchanged.
    pub fn dequeue(&self, timeout: Timeout) -> Result<T, QueueError> {
        let guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        let mut guard = wait_for(&self.data_ready, guard, timeout, |state| {
            !state.closed && state.ring.is_empty()
        })?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }

        let state = &mut *guard;
        let slot = state.ring.oldest_slot();
        let item = state.slots[slot].take();
        state.ring.retire(1);
        item.ok_or(QueueError::InvalidState)
    }

    /// Destroy every stored value. Returns how many were destroyed.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }
        Ok(guard.drain(&self.destructor))
    }

    /// Stored value count. Advisory: it may be stale by the time the caller acts on it.
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

    /// Destroy every stored value, release slot storage and wake blocked consumers.
    ///
    /// Consumers woken by the close return `InvalidState`.
    pub fn close(&self) -> Result<(), QueueError> {
        let mut guard = self.state.lock().map_err(|_| QueueError::InvalidState)?;
        if guard.closed {
            return Err(QueueError::InvalidState);
        }
        let destroyed = guard.drain(&self.destructor);
        guard.slots = Vec::new();
        guard.closed = true;
        drop(guard);

        self.data_ready.notify_all();
        log::debug!("ObjectQueue: closed, destroyed {} pending items", destroyed);
        Ok(())
    }
}

impl<T> Drop for ObjectQueue<T> {
    fn drop(&mut self) {
        let ObjectQueue {
            state, destructor, ..
        } = self;
        // A poisoned lock means a destructor already panicked; let the slots drop plainly.
        if let Ok(state) = state.get_mut() {
            if !state.closed {
                state.drain(destructor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording_queue(
        capacity: usize,
        mode: OverflowMode,
    ) -> (ObjectQueue<u32>, Arc<Mutex<Vec<u32>>>) {
        let destroyed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&destroyed);
        let queue = ObjectQueue::with_destructor(capacity, mode, move |item| {
            sink.lock().unwrap().push(item);
        })
        .unwrap();
        (queue, destroyed)
    }

    #[test]
    fn zero_capacity_rejected() {
        let result = ObjectQueue::<u32>::new(0, OverflowMode::AvoidDrop);
        assert_eq!(result.err(), Some(QueueError::InvalidParameter));
    }

    #[test]
    fn mode_parses_from_config_strings() {
        assert_eq!(
            "drop_oldest".parse::<OverflowMode>().unwrap(),
            OverflowMode::DropOldest
        );
        assert_eq!(
            " Avoid-Drop ".parse::<OverflowMode>().unwrap(),
            OverflowMode::AvoidDrop
        );
        assert!("newest".parse::<OverflowMode>().is_err());
    }

    #[test]
    fn avoid_drop_hands_item_back() {
        let (queue, destroyed) = recording_queue(1, OverflowMode::AvoidDrop);
        queue.enqueue(1).unwrap();
        let err = queue.enqueue(2).unwrap_err();
        assert_eq!(err.kind, QueueError::QueueFull);
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.count().unwrap(), 1);
        assert!(destroyed.lock().unwrap().is_empty());
    }

    #[test]
    fn drop_oldest_evicts_in_order() {
        let (queue, destroyed) = recording_queue(2, OverflowMode::DropOldest);
        for i in 1..=5 {
            queue.enqueue(i).unwrap();
            assert!(queue.count().unwrap() <= 2);
        }
        assert_eq!(*destroyed.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(queue.dequeue(Timeout::Poll).unwrap(), 4);
        assert_eq!(queue.dequeue(Timeout::Poll).unwrap(), 5);
    }

    #[test]
    fn clear_destroys_and_keeps_queue_usable() {
        let (queue, destroyed) = recording_queue(4, OverflowMode::AvoidDrop);
        queue.enqueue(7).unwrap();
        queue.enqueue(8).unwrap();
        assert_eq!(queue.clear().unwrap(), 2);
        assert_eq!(*destroyed.lock().unwrap(), vec![7, 8]);
        assert_eq!(queue.count().unwrap(), 0);

        queue.enqueue(9).unwrap();
        assert_eq!(queue.dequeue(Timeout::Poll).unwrap(), 9);
    }

    #[test]
    fn close_hands_back_later_items() {
        let (queue, destroyed) = recording_queue(2, OverflowMode::AvoidDrop);
        queue.enqueue(1).unwrap();
        queue.close().unwrap();
        assert_eq!(*destroyed.lock().unwrap(), vec![1]);

        let err = queue.enqueue(2).unwrap_err();
        assert_eq!(err.kind, QueueError::InvalidState);
        assert_eq!(err.into_inner(), 2);
        assert_eq!(queue.clear().err(), Some(QueueError::InvalidState));
    }

    #[test]
    fn drop_runs_destructor_on_pending_items() {
        let (queue, destroyed) = recording_queue(3, OverflowMode::AvoidDrop);
        queue.enqueue(4).unwrap();
        queue.enqueue(5).unwrap();
        drop(queue);
        assert_eq!(*destroyed.lock().unwrap(), vec![4, 5]);
    }

    #[test]
    fn drop_after_close_does_not_double_destroy() {
        let (queue, destroyed) = recording_queue(3, OverflowMode::AvoidDrop);
        queue.enqueue(4).unwrap();
        queue.close().unwrap();
        drop(queue);
        assert_eq!(*destroyed.lock().unwrap(), vec![4]);
    }
}
