//! Capture-to-application frame hand-off.
//!
//! `FrameQueue` is an `ObjectQueue<Frame>` whose destructor is bound to `release_frame`.
//! It adds no states of its own; every call delegates.

use crate::error::{EnqueueError, QueueError};
use crate::frame::{release_frame, Frame};
use crate::monitor::Timeout;
use crate::object_queue::{ObjectQueue, OverflowMode};

pub struct FrameQueue {
    inner: ObjectQueue<Frame>,
}

impl FrameQueue {
    pub fn new(capacity: usize, mode: OverflowMode) -> Result<Self, QueueError> {
        Ok(Self {
            inner: ObjectQueue::with_destructor(capacity, mode, release_frame)?,
        })
    }

    pub fn enqueue(&self, frame: Frame) -> Result<(), EnqueueError<Frame>> {
        self.inner.enqueue(frame)
    }

    pub fn dequeue(&self, timeout: Timeout) -> Result<Frame, QueueError> {
        self.inner.dequeue(timeout)
    }

    pub fn clear(&self) -> Result<usize, QueueError> {
        self.inner.clear()
    }

    pub fn count(&self) -> Result<usize, QueueError> {
        self.inner.count()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn mode(&self) -> OverflowMode {
        self.inner.mode()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn close(&self) -> Result<(), QueueError> {
        self.inner.close()
    }
}
