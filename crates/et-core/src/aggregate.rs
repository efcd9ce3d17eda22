//! Aggregate duration badge.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::session::Session;
use crate::store::SessionStore;

/// Display-surface message describing the aggregate badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BadgeUpdate {
    UpdateBadge { text: String },
    ClearBadge,
}

impl BadgeUpdate {
    /// Badge for a total number of minutes; zero clears the badge.
    pub fn from_total(minutes: i64) -> Self {
        if minutes <= 0 {
            Self::ClearBadge
        } else {
            Self::UpdateBadge {
                text: format!("{minutes}min"),
            }
        }
    }
}

/// Receives badge updates.
pub trait BadgeSink {
    fn publish(&mut self, update: &BadgeUpdate);
}

/// Sums `duration_minutes` across sessions.
pub fn total_minutes(sessions: &[Session]) -> i64 {
    sessions
        .iter()
        .fold(0, |total, s| total.saturating_add(s.duration_minutes))
}

/// Recomputes the aggregate from the store and publishes it.
#[derive(Debug)]
pub struct AggregateReporter<B> {
    sink: B,
}

impl<B: BadgeSink> AggregateReporter<B> {
    pub const fn new(sink: B) -> Self {
        Self { sink }
    }

    /// Scans every stored session and publishes the resulting badge.
    pub fn refresh(&mut self, store: &impl SessionStore) -> Result<BadgeUpdate, StoreError> {
        let sessions = store.load_all()?;
        let total = total_minutes(&sessions);
        let update = BadgeUpdate::from_total(total);
        tracing::debug!(total, sessions = sessions.len(), "refreshed aggregate");
        self.sink.publish(&update);
        Ok(update)
    }

    pub const fn sink(&self) -> &B {
        &self.sink
    }

    pub const fn sink_mut(&mut self) -> &mut B {
        &mut self.sink
    }
}
