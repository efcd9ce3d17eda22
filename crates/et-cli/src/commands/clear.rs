//! Clear command for dropping a contact's live session.

use std::io::Write;

use anyhow::Result;
use et_core::SessionStore;

pub fn run<W: Write>(writer: &mut W, store: &mut impl SessionStore, contact: &str) -> Result<()> {
    if contact.trim().is_empty() {
        anyhow::bail!("contact cannot be empty");
    }
    if store.load(contact)?.is_none() {
        writeln!(writer, "No live session for {contact}.")?;
        return Ok(());
    }
    store.clear(contact)?;
    tracing::info!(contact, "session cleared");
    writeln!(writer, "Cleared session for {contact}.")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;
    use et_core::{MemoryStore, Session};

    #[test]
    fn test_clears_existing_session() {
        let mut store = MemoryStore::new();
        let session = Session::open(
            "Bob",
            0,
            NaiveDate::from_ymd_opt(2025, 1, 29).unwrap(),
            "Unknown",
        );
        store.save("Bob", &session).unwrap();

        let mut output = Vec::new();
        run(&mut output, &mut store, "Bob").unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "Cleared session for Bob.\n");
        assert!(store.is_empty());
    }

    #[test]
    fn test_reports_missing_session() {
        let mut output = Vec::new();
        run(&mut output, &mut MemoryStore::new(), "Bob").unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No live session for Bob.\n");
    }

    #[test]
    fn test_rejects_empty_contact() {
        let mut output = Vec::new();
        let err = run(&mut output, &mut MemoryStore::new(), " ").unwrap_err();
        assert!(err.to_string().contains("contact"));
    }
}
