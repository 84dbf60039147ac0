//! Blocking wait shared by both queue flavors.
//!
//! Both queues keep their state behind one `Mutex` and signal a single `Condvar` when data
//! arrives. `wait_for` re-checks the predicate after every wake and measures the timeout
//! against a fixed deadline, so spurious wakes neither end the wait early nor extend it.

use std::sync::{Condvar, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::QueueError;

/// Legacy "block forever" sentinel for millisecond timeouts.
pub const INFINITE_MILLIS: u32 = u32::MAX;

/// How long a dequeue may block while the queue is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// Return immediately.
    Poll,
    /// Block up to the given duration.
    After(Duration),
    /// Block until data arrives or the queue is closed.
    Infinite,
}

impl Timeout {
    /// `0` polls, [`INFINITE_MILLIS`] blocks forever.
    pub fn from_millis(ms: u32) -> Self {
        match ms {
            0 => Timeout::Poll,
            INFINITE_MILLIS => Timeout::Infinite,
            ms => Timeout::After(Duration::from_millis(u64::from(ms))),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        if duration.is_zero() {
            Timeout::Poll
        } else {
            Timeout::After(duration)
        }
    }
}

/// Block on `condvar` while `pending` holds.
///
/// Returns the reacquired guard once `pending` is false, or `QueueError::Timeout` if the
/// deadline passes first. The guarded state is never touched here, so a timeout leaves it
/// exactly as the caller found it.
pub(crate) fn wait_for<'a, S, F>(
    condvar: &Condvar,
    mut guard: MutexGuard<'a, S>,
    timeout: Timeout,
    mut pending: F,
) -> Result<MutexGuard<'a, S>, QueueError>
where
    F: FnMut(&S) -> bool,
{
    let deadline = match timeout {
        Timeout::After(duration) => Instant::now().checked_add(duration),
        Timeout::Poll | Timeout::Infinite => None,
    };

    loop {
        if !pending(&guard) {
            return Ok(guard);
        }
        match (timeout, deadline) {
            (Timeout::Poll, _) => return Err(QueueError::Timeout),
            (Timeout::After(_), Some(deadline)) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(QueueError::Timeout);
                }
                let (reacquired, _) = condvar
                    .wait_timeout(guard, remaining)
                    .map_err(|_| QueueError::InvalidState)?;
                guard = reacquired;
            }
            // Infinite, or a duration too large to express as a deadline.
            _ => {
                guard = condvar.wait(guard).map_err(|_| QueueError::InvalidState)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    #[test]
    fn millis_sentinels() {
        assert_eq!(Timeout::from_millis(0), Timeout::Poll);
        assert_eq!(Timeout::from_millis(INFINITE_MILLIS), Timeout::Infinite);
        assert_eq!(
            Timeout::from_millis(25),
            Timeout::After(Duration::from_millis(25))
        );
        assert_eq!(Timeout::from(Duration::ZERO), Timeout::Poll);
    }

    #[test]
    fn poll_does_not_block() {
        let lock = Mutex::new(0u32);
        let condvar = Condvar::new();
        let guard = lock.lock().unwrap();
        let result = wait_for(&condvar, guard, Timeout::Poll, |value| *value == 0);
        assert_eq!(result.err(), Some(QueueError::Timeout));
    }

    #[test]
    fn returns_once_predicate_clears() {
        let shared = Arc::new((Mutex::new(0u32), Condvar::new()));
        let producer = Arc::clone(&shared);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let (lock, condvar) = &*producer;
            *lock.lock().unwrap() = 7;
            condvar.notify_all();
        });

        let (lock, condvar) = &*shared;
        let guard = lock.lock().unwrap();
        let guard = wait_for(condvar, guard, Timeout::Infinite, |value| *value == 0).unwrap();
        assert_eq!(*guard, 7);
        drop(guard);
        handle.join().unwrap();
    }

    #[test]
    fn deadline_survives_spurious_wakes() {
        let lock = Mutex::new(());
        let condvar = Condvar::new();
        let start = Instant::now();
        let guard = lock.lock().unwrap();
        let result = wait_for(
            &condvar,
            guard,
            Timeout::After(Duration::from_millis(50)),
            |_| true,
        );
        assert_eq!(result.err(), Some(QueueError::Timeout));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
