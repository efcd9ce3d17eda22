//! Status command for showing the aggregate of live sessions.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use et_core::{BadgeUpdate, SessionStore, total_minutes};

pub fn run<W: Write>(
    writer: &mut W,
    store: &impl SessionStore,
    database_path: &Path,
    json: bool,
) -> Result<()> {
    let sessions = store.load_all()?;
    let total = total_minutes(&sessions);

    if json {
        let badge = BadgeUpdate::from_total(total);
        writeln!(writer, "{}", serde_json::to_string(&badge)?)?;
        return Ok(());
    }

    writeln!(writer, "Engagement tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    if sessions.is_empty() {
        writeln!(writer, "No live sessions.")?;
        return Ok(());
    }

    writeln!(writer, "Live sessions: {}", sessions.len())?;
    writeln!(writer, "Total: {total}min")?;

    Ok(())
}
