//! Deterministic doubles for driving the lifecycle without real time,
//! timers or network.
//!
//! Handles are cheap to clone and share state, so a test can keep one copy
//! while the lifecycle owns the other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate};

use crate::aggregate::{BadgeSink, BadgeUpdate};
use crate::clock::Clock;
use crate::delivery::Delivery;
use crate::error::DeliveryError;
use crate::session::Session;
use crate::timer::{TimerId, TimerRegistry};

/// A clock that only moves when told to. Dates are taken in UTC.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn at(now_ms: i64) -> Self {
        let clock = Self::default();
        clock.set(now_ms);
        clock
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now_ms.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }

    fn today(&self) -> NaiveDate {
        DateTime::from_timestamp_millis(self.now_ms())
            .unwrap_or_default()
            .date_naive()
    }
}

/// A pending timer recorded by [`ManualTimers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManualTimer {
    pub id: TimerId,
    pub after: Duration,
}

/// A timer registry that records schedules and never fires on its own.
#[derive(Debug, Default)]
pub struct ManualTimers {
    next_id: u64,
    pending: HashMap<String, ManualTimer>,
    scheduled_total: usize,
}

impl ManualTimers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, contact: &str) -> Option<ManualTimer> {
        self.pending.get(contact).copied()
    }

    /// Total number of timers ever scheduled.
    pub const fn scheduled_total(&self) -> usize {
        self.scheduled_total
    }
}

impl TimerRegistry for ManualTimers {
    fn schedule(&mut self, contact: &str, after: Duration) -> TimerId {
        self.next_id += 1;
        self.scheduled_total += 1;
        let id = TimerId::new(self.next_id);
        self.pending
            .insert(contact.to_string(), ManualTimer { id, after });
        id
    }

    fn cancel(&mut self, contact: &str) -> bool {
        self.pending.remove(contact).is_some()
    }

    fn pending(&self, contact: &str) -> Option<TimerId> {
        self.pending.get(contact).map(|t| t.id)
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Records submitted sessions; optionally fails every submission.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelivery {
    submitted: Arc<Mutex<Vec<(Session, String)>>>,
    fail: bool,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// A delivery whose submissions all fail with a transport error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<(Session, String)> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Delivery for RecordingDelivery {
    fn submit(&self, session: &Session, endpoint: &str) -> Result<(), DeliveryError> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((session.clone(), endpoint.to_string()));
        if self.fail {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

/// Records published badge updates.
#[derive(Debug, Clone, Default)]
pub struct RecordingBadge {
    updates: Arc<Mutex<Vec<BadgeUpdate>>>,
}

impl RecordingBadge {
    pub fn updates(&self) -> Vec<BadgeUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<BadgeUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl BadgeSink for RecordingBadge {
    fn publish(&mut self, update: &BadgeUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update.clone());
    }
}
