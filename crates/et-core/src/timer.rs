//! Per-contact single-shot timers.

use std::time::Duration;

/// Identifies one scheduled timer.
///
/// An expiration carries the id it was scheduled with so a superseded timer
/// can be recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Schedules at most one pending inactivity timer per contact.
pub trait TimerRegistry {
    /// Schedules a timer for `contact` firing after `after`, replacing any
    /// pending one.
    fn schedule(&mut self, contact: &str, after: Duration) -> TimerId;

    /// Cancels the pending timer for `contact`. Returns whether one was pending.
    fn cancel(&mut self, contact: &str) -> bool;

    /// The pending timer for `contact`, if any.
    fn pending(&self, contact: &str) -> Option<TimerId>;

    /// Number of contacts with a pending timer.
    fn pending_count(&self) -> usize;
}
