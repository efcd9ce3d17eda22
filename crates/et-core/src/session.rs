//! Engagement sessions and their time arithmetic.
//!
//! A session is a bounded window of outgoing activity for one contact. Times
//! are epoch milliseconds. The JSON form of [`Session`] is both the persisted
//! record and the delivery payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Milliseconds in one minute.
pub const MS_PER_MINUTE: i64 = 60_000;

/// Attributable engagement per outgoing message, in seconds.
pub const SECONDS_PER_MESSAGE: i64 = 60;

/// Date label format (`DD/MM/YYYY`).
const DATE_LABEL_FORMAT: &str = "%d/%m/%Y";

/// One contact's engagement session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Calendar date the session was opened.
    #[serde(rename = "date")]
    pub date_label: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration_minutes: i64,
    pub message_count: u32,
    /// Operator label copied from configuration when the session opened.
    pub operator: String,
    pub contact: String,
}

/// Why a session failed validation at finalize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invalidity {
    /// `start_time` is not strictly before `end_time`.
    EmptyRange { start_time: i64, end_time: i64 },
    /// No qualifying messages were counted.
    NoMessages,
    /// The stored record could not be decoded.
    Corrupt,
}

impl std::fmt::Display for Invalidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyRange {
                start_time,
                end_time,
            } => write!(f, "empty time range {start_time}..{end_time}"),
            Self::NoMessages => f.write_str("no messages"),
            Self::Corrupt => f.write_str("undecodable record"),
        }
    }
}

/// A plausibility clamp applied to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamp {
    pub actual_seconds: i64,
    pub max_allowed_seconds: i64,
}

impl Session {
    /// Opens a session with its first qualifying message at `at_ms`.
    pub fn open(contact: &str, at_ms: i64, today: NaiveDate, operator: &str) -> Self {
        Self {
            date_label: today.format(DATE_LABEL_FORMAT).to_string(),
            start_time: at_ms,
            end_time: at_ms,
            duration_minutes: 0,
            message_count: 1,
            operator: operator.to_string(),
            contact: contact.to_string(),
        }
    }

    /// Extends the session with another message observed at `now_ms`.
    ///
    /// Returns `true` if `now_ms` preceded the start and the end was pinned to
    /// the start instead.
    pub fn continue_at(&mut self, now_ms: i64) -> bool {
        let regressed = now_ms < self.start_time;
        self.end_time = now_ms.max(self.start_time);
        self.message_count = self.message_count.saturating_add(1);
        self.duration_minutes = elapsed_minutes(self.start_time, self.end_time);
        regressed
    }

    /// Checks the session is deliverable.
    pub const fn validate(&self) -> Result<(), Invalidity> {
        if self.start_time >= self.end_time {
            return Err(Invalidity::EmptyRange {
                start_time: self.start_time,
                end_time: self.end_time,
            });
        }
        if self.message_count == 0 {
            return Err(Invalidity::NoMessages);
        }
        Ok(())
    }

    /// Bounds the session to [`SECONDS_PER_MESSAGE`] per counted message.
    ///
    /// Returns the clamp that was applied, if any.
    pub fn clamp(&mut self) -> Option<Clamp> {
        let max_allowed_seconds = i64::from(self.message_count) * SECONDS_PER_MESSAGE;
        let actual_seconds = self.actual_seconds();
        if actual_seconds <= max_allowed_seconds {
            return None;
        }
        self.end_time = self
            .start_time
            .saturating_add(max_allowed_seconds.saturating_mul(1000));
        self.duration_minutes = (max_allowed_seconds + 59) / 60;
        Some(Clamp {
            actual_seconds,
            max_allowed_seconds,
        })
    }

    /// Whole seconds between start and end.
    pub const fn actual_seconds(&self) -> i64 {
        self.end_time.saturating_sub(self.start_time).div_euclid(1000)
    }

    /// Whether the record satisfies `start_time <= end_time`.
    pub const fn is_persistable(&self) -> bool {
        self.start_time <= self.end_time
    }
}

/// Minutes credited for a session spanning `start_ms..end_ms`.
///
/// Always at least one: the partial minute in progress counts.
pub const fn elapsed_minutes(start_ms: i64, end_ms: i64) -> i64 {
    end_ms.saturating_sub(start_ms).div_euclid(MS_PER_MINUTE) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 29).unwrap()
    }

    #[test]
    fn test_open_counts_first_message() {
        let session = Session::open("Alice", 1_000, day(), "ops");
        assert_eq!(session.start_time, 1_000);
        assert_eq!(session.end_time, 1_000);
        assert_eq!(session.message_count, 1);
        assert_eq!(session.duration_minutes, 0);
        assert_eq!(session.date_label, "29/01/2025");
    }

    #[test]
    fn test_continuation_duration_matches_formula() {
        let mut session = Session::open("Bob", 0, day(), "ops");
        let mut last = 0;
        for now in [1, 59_999, 60_000, 61_000, 180_000, 3_599_999] {
            assert!(!session.continue_at(now));
            assert_eq!(session.duration_minutes, now / MS_PER_MINUTE + 1);
            assert!(session.duration_minutes >= last);
            last = session.duration_minutes;
        }
        assert_eq!(session.message_count, 7);
    }

    #[test]
    fn test_continuation_before_start_pins_end() {
        let mut session = Session::open("Bob", 10_000, day(), "ops");
        assert!(session.continue_at(5_000));
        assert_eq!(session.end_time, 10_000);
        assert_eq!(session.duration_minutes, 1);
        assert!(session.is_persistable());
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let session = Session::open("Alice", 0, day(), "ops");
        assert_eq!(
            session.validate(),
            Err(Invalidity::EmptyRange {
                start_time: 0,
                end_time: 0
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_messages() {
        let mut session = Session::open("Alice", 0, day(), "ops");
        session.continue_at(30_000);
        session.message_count = 0;
        assert_eq!(session.validate(), Err(Invalidity::NoMessages));
    }

    #[test]
    fn test_clamp_bounds_duration_by_message_count() {
        for count in 1..=5_u32 {
            let mut session = Session::open("Carla", 0, day(), "ops");
            session.message_count = count;
            session.end_time = 3_600_000;
            let clamp = session.clamp().unwrap();
            assert_eq!(clamp.actual_seconds, 3_600);
            assert_eq!(clamp.max_allowed_seconds, i64::from(count) * 60);
            assert_eq!(session.actual_seconds(), i64::from(count) * 60);
            assert_eq!(session.duration_minutes, i64::from(count));
        }
    }

    #[test]
    fn test_clamp_leaves_plausible_session_alone() {
        let mut session = Session::open("Bob", 0, day(), "ops");
        session.continue_at(30_000);
        let before = session.clone();
        assert_eq!(session.clamp(), None);
        assert_eq!(session, before);
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        let mut session = Session::open("Zed", i64::MIN, day(), "ops");
        assert!(!session.continue_at(i64::MAX));
        assert_eq!(session.duration_minutes, i64::MAX / MS_PER_MINUTE + 1);
        assert_eq!(session.actual_seconds(), i64::MAX / 1000);

        let clamp = session.clamp().unwrap();
        assert_eq!(clamp.max_allowed_seconds, 120);
        assert_eq!(session.end_time, i64::MIN + 120_000);
        assert_eq!(session.duration_minutes, 2);

        let mut late = Session::open("Zed", i64::MAX - 10, day(), "ops");
        late.message_count = u32::MAX;
        late.end_time = i64::MAX;
        assert_eq!(late.clamp(), None);
        assert!(late.is_persistable());
    }

    #[test]
    fn test_json_uses_wire_field_names() {
        let mut session = Session::open("Bob", 0, day(), "Unknown");
        session.continue_at(30_000);
        let json = serde_json::to_string_pretty(&session).unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "date": "29/01/2025",
          "startTime": 0,
          "endTime": 30000,
          "durationMinutes": 1,
          "messageCount": 2,
          "operator": "Unknown",
          "contact": "Bob"
        }
        "#);
    }
}
