//! One-shot timer queue over a caller-driven clock.
//!
//! [`TimerQueue`] never reads the wall clock itself. The simulator advances
//! it in virtual time; the tokio runtime advances it with the elapsed time
//! since the node started. Expired timers are popped in deadline order,
//! ties broken by arming order.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::core::{TimerId, TimerService};

/// Deadline-ordered set of armed timers.
#[derive(Debug, Default)]
pub struct TimerQueue {
    now: Duration,
    next_id: u64,
    queue: BTreeSet<(Duration, TimerId)>,
    deadlines: HashMap<TimerId, Duration>,
}

impl TimerQueue {
    /// Create an empty queue at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current clock value.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Move the clock forward. Moving backwards is ignored.
    pub fn advance_to(&mut self, now: Duration) {
        self.now = self.now.max(now);
    }

    /// Earliest armed deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.first().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer whose deadline has passed.
    pub fn pop_expired(&mut self) -> Vec<TimerId> {
        let mut expired = Vec::new();
        while let Some(&(deadline, id)) = self.queue.first() {
            if deadline > self.now {
                break;
            }
            self.queue.pop_first();
            self.deadlines.remove(&id);
            expired.push(id);
        }
        expired
    }

    /// Deadline of `id`, if armed.
    pub fn deadline(&self, id: TimerId) -> Option<Duration> {
        self.deadlines.get(&id).copied()
    }

    /// Check whether `id` is armed.
    pub fn is_armed(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// Check if no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl TimerService for TimerQueue {
    fn start(&mut self, after: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let deadline = self.now + after;
        self.queue.insert((deadline, id));
        self.deadlines.insert(id, deadline);
        id
    }

    fn stop(&mut self, id: TimerId) {
        if let Some(deadline) = self.deadlines.remove(&id) {
            self.queue.remove(&(deadline, id));
        }
    }
}
