//! Sessions command for listing live sessions.

use std::io::Write;

use anyhow::Result;
use chrono::DateTime;
use et_core::SessionStore;

/// Formats epoch milliseconds as a UTC timestamp.
fn format_ms(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    )
}

pub fn run<W: Write>(writer: &mut W, store: &impl SessionStore, json: bool) -> Result<()> {
    let sessions = store.load_all()?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&sessions)?)?;
        return Ok(());
    }

    if sessions.is_empty() {
        writeln!(writer, "No live sessions.")?;
        return Ok(());
    }

    for session in &sessions {
        writeln!(
            writer,
            "{} [{}] {}..{} messages={} duration={}min operator={}",
            session.contact,
            session.date_label,
            format_ms(session.start_time),
            format_ms(session.end_time),
            session.message_count,
            session.duration_minutes,
            session.operator,
        )?;
    }

    Ok(())
}
