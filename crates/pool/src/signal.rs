//! Waiter-counting condition variable used to park acquirers.
//!
//! [`Signal`] pairs a `parking_lot::Condvar` with a count of parked threads.
//! The count is only modified while the caller holds the mutex that guards
//! the pool, and `Condvar::wait_until` releases that mutex and enqueues the
//! thread in one step, so a notify issued under the same mutex cannot be lost
//! between "counted as waiting" and "actually parked".

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, MutexGuard};

/// Outcome of [`Signal::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitOutcome {
    /// Woken by a notify (or spuriously); the caller must re-check its condition.
    Notified,
    /// The deadline passed.
    TimedOut,
}

#[derive(Debug, Default)]
pub(crate) struct Signal {
    condvar: Condvar,
    waiting: AtomicUsize,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Release `guard`'s mutex and park until notified or `deadline` passes.
    ///
    /// The mutex is held again when this returns. `None` parks without a
    /// deadline.
    pub(crate) fn wait<T>(
        &self,
        guard: &mut MutexGuard<'_, T>,
        deadline: Option<Instant>,
    ) -> WaitOutcome {
        self.waiting.fetch_add(1, Ordering::Relaxed);
        let outcome = match deadline {
            Some(deadline) => {
                if self.condvar.wait_until(guard, deadline).timed_out() {
                    WaitOutcome::TimedOut
                } else {
                    WaitOutcome::Notified
                }
            }
            None => {
                self.condvar.wait(guard);
                WaitOutcome::Notified
            }
        };
        self.waiting.fetch_sub(1, Ordering::Relaxed);
        outcome
    }

    /// Wake one parked thread. Returns `false` when nobody was waiting.
    pub(crate) fn notify_one(&self) -> bool {
        if self.waiting() == 0 {
            return false;
        }
        self.condvar.notify_one()
    }

    /// Wake every parked thread, returning how many were waiting.
    pub(crate) fn notify_all(&self) -> usize {
        let waiting = self.waiting();
        if waiting > 0 {
            self.condvar.notify_all();
        }
        waiting
    }

    /// Threads currently parked in [`wait`](Self::wait).
    pub(crate) fn waiting(&self) -> usize {
        self.waiting.load(Ordering::Relaxed)
    }
}
