//! One-shot delayed tasks run from the main loop.
//!
//! Nothing here runs on its own: the owner calls [`Scheduler::take_due`] on
//! every tick and executes whatever comes back. There is no cancellation;
//! a task that may have become stale must check its preconditions when it
//! runs.

use std::time::{Duration, Instant};

/// Queue of tasks ordered by due time.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: Vec<(Instant, T)>,
}

impl<T> Scheduler<T> {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Queue `task` to become due `delay` after `now`.
    pub fn schedule(&mut self, now: Instant, delay: Duration, task: T) {
        let due = now + delay;
        // Stable insert keeps FIFO order among tasks due at the same instant.
        let idx = self.pending.partition_point(|(d, _)| *d <= due);
        self.pending.insert(idx, (due, task));
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        if self.is_empty() {
            return Vec::new();
        }
        let split = self.pending.partition_point(|(d, _)| *d <= now);
        self.pending.drain(..split).map(|(_, task)| task).collect()
    }

    /// Whether any pending task matches `pred`.
    pub fn contains(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.pending.iter().any(|(_, task)| pred(task))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}
