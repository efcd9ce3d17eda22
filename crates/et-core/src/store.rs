//! Per-contact durable session storage.
//!
//! Records are keyed by `session:<contact>` and hold the JSON-encoded
//! [`Session`]. Writes are last-write-wins; the lifecycle is the only writer.

use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::session::Session;

/// Key prefix namespacing session records.
pub const SESSION_KEY_PREFIX: &str = "session:";

/// Durable storage of at most one session per contact.
pub trait SessionStore {
    /// Loads the stored session for `contact`, if any.
    fn load(&self, contact: &str) -> Result<Option<Session>, StoreError>;

    /// Stores `session` as the live session for `contact`.
    fn save(&mut self, contact: &str, session: &Session) -> Result<(), StoreError>;

    /// Removes the stored session for `contact`. Removing nothing is not an error.
    fn clear(&mut self, contact: &str) -> Result<(), StoreError>;

    /// Loads every stored session across all contacts.
    fn load_all(&self) -> Result<Vec<Session>, StoreError>;

    /// Lists every contact with a stored record, including undecodable ones.
    fn contacts(&self) -> Result<Vec<String>, StoreError>;
}

/// Returns the namespaced storage key for a contact.
pub fn session_key(contact: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{contact}")
}

/// Serializes a session for storage, refusing inverted time ranges.
pub fn encode_session(contact: &str, session: &Session) -> Result<String, StoreError> {
    if !session.is_persistable() {
        return Err(StoreError::InvertedRange {
            contact: contact.to_string(),
            start_time: session.start_time,
            end_time: session.end_time,
        });
    }
    serde_json::to_string(session).map_err(|source| StoreError::Encode {
        contact: contact.to_string(),
        source,
    })
}

/// The contact a session key belongs to, if it is a session key.
pub fn contact_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(SESSION_KEY_PREFIX)
}

/// Deserializes a stored session record.
pub fn decode_session(key: &str, value: &str) -> Result<Session, StoreError> {
    serde_json::from_str(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

/// In-memory [`SessionStore`] holding encoded records, like the durable stores do.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    records: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes a raw record, bypassing encoding. Useful for seeding bad data.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.records.insert(key.into(), value.into());
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, contact: &str) -> Result<Option<Session>, StoreError> {
        let key = session_key(contact);
        self.records
            .get(&key)
            .map(|value| decode_session(&key, value))
            .transpose()
    }

    fn save(&mut self, contact: &str, session: &Session) -> Result<(), StoreError> {
        let value = encode_session(contact, session)?;
        self.records.insert(session_key(contact), value);
        Ok(())
    }

    fn clear(&mut self, contact: &str) -> Result<(), StoreError> {
        self.records.remove(&session_key(contact));
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();
        for (key, value) in &self.records {
            if !key.starts_with(SESSION_KEY_PREFIX) {
                continue;
            }
            match decode_session(key, value) {
                Ok(session) => sessions.push(session),
                Err(err) => tracing::warn!(%key, error = %err, "skipping corrupt session record"),
            }
        }
        Ok(sessions)
    }

    fn contacts(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .keys()
            .filter_map(|key| contact_from_key(key))
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn session(contact: &str, start: i64, end: i64) -> Session {
        let mut session = Session::open(
            contact,
            start,
            NaiveDate::from_ymd_opt(2025, 1, 29).unwrap(),
            "ops",
        );
        session.end_time = end;
        session
    }

    #[test]
    fn test_save_load_clear() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load("Alice").unwrap(), None);

        let alice = session("Alice", 0, 5_000);
        store.save("Alice", &alice).unwrap();
        assert_eq!(store.load("Alice").unwrap(), Some(alice));

        store.clear("Alice").unwrap();
        assert_eq!(store.load("Alice").unwrap(), None);
        store.clear("Alice").unwrap();
    }

    #[test]
    fn test_contacts_are_isolated() {
        let mut store = MemoryStore::new();
        store.save("Alice", &session("Alice", 0, 1)).unwrap();
        store.save("Bob", &session("Bob", 0, 2)).unwrap();
        store.clear("Alice").unwrap();

        assert_eq!(store.load("Alice").unwrap(), None);
        assert_eq!(store.load("Bob").unwrap().unwrap().end_time, 2);
        assert_eq!(store.load_all().unwrap().len(), 1);
    }

    #[test]
    fn test_refuses_inverted_range() {
        let mut store = MemoryStore::new();
        let err = store.save("Alice", &session("Alice", 10, 5)).unwrap_err();
        assert!(matches!(err, StoreError::InvertedRange { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_record_errors_on_load_and_is_skipped_in_scan() {
        let mut store = MemoryStore::new();
        store.insert_raw(session_key("Alice"), "{not json");
        store.save("Bob", &session("Bob", 0, 1)).unwrap();
        store.insert_raw("settings", "{}");

        assert!(matches!(
            store.load("Alice"),
            Err(StoreError::Corrupt { .. })
        ));
        let all = store.load_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].contact, "Bob");
        assert_eq!(store.contacts().unwrap(), vec!["Alice", "Bob"]);
    }
}
