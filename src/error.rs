//! Status taxonomy shared by every queue operation.

use std::fmt;

/// Failure kinds returned by queue operations.
///
/// `QueueFull` is the back-pressure signal of an `AvoidDrop` queue. Its status code is
/// `OUT_OF_MEMORY` so callers that speak the legacy status vocabulary see the same value
/// they would for a real allocation failure. Match on the variant to tell them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueError {
    /// Bad capacity, zero-length request, or malformed collaborator input.
    InvalidParameter,
    /// Storage could not be allocated.
    OutOfMemory,
    /// An `AvoidDrop` queue is full. Reported as `OUT_OF_MEMORY`.
    QueueFull,
    /// No data arrived before the dequeue timeout.
    Timeout,
    /// The queue is closed or its lock was poisoned.
    InvalidState,
}

impl QueueError {
    /// Stable status code for logs and FFI-style callers.
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::InvalidParameter => "INVALID_PARAMETER",
            QueueError::OutOfMemory | QueueError::QueueFull => "OUT_OF_MEMORY",
            QueueError::Timeout => "TIMEOUT",
            QueueError::InvalidState => "INVALID_STATE",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            QueueError::InvalidParameter => "invalid parameter",
            QueueError::OutOfMemory => "storage allocation failed",
            QueueError::QueueFull => "queue is full",
            QueueError::Timeout => "timed out waiting for data",
            QueueError::InvalidState => "queue is closed or poisoned",
        }
    }
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for QueueError {}

/// A rejected enqueue. The value was never taken by the queue and is handed back.
pub struct EnqueueError<T> {
    pub kind: QueueError,
    pub item: T,
}

impl<T> EnqueueError<T> {
    pub(crate) fn new(kind: QueueError, item: T) -> Self {
        Self { kind, item }
    }

    /// Take the rejected value back.
    pub fn into_inner(self) -> T {
        self.item
    }
}

// Manual impls so `T` needs no `Debug`/`Display` bound.
impl<T> fmt::Debug for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnqueueError")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue rejected: {}", self.kind)
    }
}

impl<T> std::error::Error for EnqueueError<T> {}

impl<T> From<EnqueueError<T>> for QueueError {
    fn from(err: EnqueueError<T>) -> Self {
        err.kind
    }
}
