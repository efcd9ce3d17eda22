//! Wall-clock source.

use chrono::{Local, NaiveDate, Utc};

/// Supplies the current time to the session lifecycle.
pub trait Clock {
    /// Current wall-clock time in epoch milliseconds.
    fn now_ms(&self) -> i64;

    /// Current calendar date, used for session date labels.
    fn today(&self) -> NaiveDate;
}

/// The system clock. Dates are taken in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_close_to_utc_now() {
        let before = Utc::now().timestamp_millis();
        let now = SystemClock.now_ms();
        let after = Utc::now().timestamp_millis();
        assert!(before <= now && now <= after);
    }
}
