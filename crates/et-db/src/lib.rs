//! Storage layer for the engagement tracker.
//!
//! Provides durable per-contact session records using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The tracker drives every session from one logical thread, so a single
//! `Database` owned by the lifecycle is all that is needed.
//!
//! # Schema
//!
//! A single key-value table. Session records live under `session:<contact>`
//! keys and hold the JSON-encoded session, exactly as delivered:
//!
//! ```text
//! {"date":"29/01/2025","startTime":0,"endTime":30000,"durationMinutes":1,
//!  "messageCount":2,"operator":"Unknown","contact":"Bob"}
//! ```
//!
//! `updated_at` is ISO 8601 UTC and is informational only. Writes are
//! last-write-wins.

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use et_core::store::{
    SESSION_KEY_PREFIX, contact_from_key, decode_session, encode_session, session_key,
};
use et_core::{Session, SessionStore, StoreError};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self::Backend(Box::new(err))
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Reads a raw record by key.
    pub fn get_raw(&self, key: &str) -> Result<Option<String>, DbError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Writes a raw record, replacing any existing value.
    pub fn put_raw(&self, key: &str, value: &str) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        self.conn.execute(
            "
            INSERT INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Deletes a record. Returns whether one existed.
    pub fn delete_raw(&self, key: &str) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM records WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }

    /// Lists `(key, value)` pairs whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM records WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let rows = stmt
            .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl SessionStore for Database {
    fn load(&self, contact: &str) -> Result<Option<Session>, StoreError> {
        let key = session_key(contact);
        self.get_raw(&key)?
            .map(|value| decode_session(&key, &value))
            .transpose()
    }

    fn save(&mut self, contact: &str, session: &Session) -> Result<(), StoreError> {
        let value = encode_session(contact, session)?;
        self.put_raw(&session_key(contact), &value)?;
        Ok(())
    }

    fn clear(&mut self, contact: &str) -> Result<(), StoreError> {
        self.delete_raw(&session_key(contact))?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut sessions = Vec::new();
        for (key, value) in self.scan_prefix(SESSION_KEY_PREFIX)? {
            match decode_session(&key, &value) {
                Ok(session) => sessions.push(session),
                Err(err) => tracing::warn!(%key, error = %err, "skipping corrupt session record"),
            }
        }
        Ok(sessions)
    }

    fn contacts(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .scan_prefix(SESSION_KEY_PREFIX)?
            .iter()
            .filter_map(|(key, _)| contact_from_key(key))
            .map(str::to_string)
            .collect())
    }
}
