//! Outgoing-activity events.
//!
//! The page-observation adapter emits one [`ActivityEvent`] per outgoing
//! message it sees. The event's time comes either from an explicit epoch
//! timestamp or from the message's `[HH:MM, DD/MM/YYYY]` prefix.

use std::sync::LazyLock;

use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Pre-compiled regex for the message prefix timestamp.
static MESSAGE_TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d{2}:\d{2}), (\d{2}/\d{2}/\d{4})\]").unwrap());

/// Outgoing activity detected for a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub contact: String,
    /// Approximate event time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approx_time: Option<i64>,
    /// Raw message prefix text, e.g. `[14:05, 29/01/2025] Ana: `.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_plain_text: Option<String>,
}

impl ActivityEvent {
    pub fn new(contact: impl Into<String>, approx_time: Option<i64>) -> Self {
        Self {
            contact: contact.into(),
            approx_time,
            pre_plain_text: None,
        }
    }

    /// Whether the event time comes from a minute-precision page prefix.
    pub fn timestamp_from_prefix(&self) -> bool {
        self.approx_time.is_none()
            && self
                .pre_plain_text
                .as_deref()
                .and_then(parse_message_timestamp)
                .is_some()
    }

    /// The event time, if one is available and parseable.
    pub fn event_time(&self) -> Option<i64> {
        self.approx_time.or_else(|| {
            self.pre_plain_text
                .as_deref()
                .and_then(parse_message_timestamp)
        })
    }
}

/// Parses a `[HH:MM, DD/MM/YYYY]` message prefix as local time.
///
/// Returns epoch milliseconds, or `None` if the text carries no valid timestamp.
pub fn parse_message_timestamp(text: &str) -> Option<i64> {
    let caps = MESSAGE_TIMESTAMP_RE.captures(text)?;
    let time = NaiveTime::parse_from_str(&caps[1], "%H:%M").ok()?;
    let date = NaiveDate::parse_from_str(&caps[2], "%d/%m/%Y").ok()?;
    let local = Local.from_local_datetime(&date.and_time(time)).earliest()?;
    Some(local.timestamp_millis())
}
