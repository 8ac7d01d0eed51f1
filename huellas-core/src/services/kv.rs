// huellas-core/src/services/kv.rs
//! Local key-value persistence (the device's "defaults" store).
//!
//! - Synchronous get/set keyed by string, durable across restarts.
//! - Values are stored as text; typed helpers parse on read.
//! - `SqliteKv` owns a single SQLite connection (WAL) behind a mutex.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;

pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_raw(key)
    }

    fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_raw(key, value)
    }

    /// Missing keys read as `None`; a present but non-numeric value is an error.
    fn get_int(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.get_raw(key)? {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<i64>().map(Some).map_err(|_| StoreError::Parse {
                key: key.to_string(),
                expected: "integer",
                raw,
            }),
        }
    }

    fn set_int(&self, key: &str, value: i64) -> Result<(), StoreError> {
        self.set_raw(key, &value.to_string())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        match self.get_raw(key)?.as_deref() {
            None => Ok(None),
            Some("1") | Some("true") => Ok(Some(true)),
            Some("0") | Some("false") => Ok(Some(false)),
            Some(other) => Err(StoreError::Parse {
                key: key.to_string(),
                expected: "boolean",
                raw: other.to_string(),
            }),
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        self.set_raw(key, if value { "1" } else { "0" })
    }
}

pub struct SqliteKv {
    db: Mutex<Connection>,
}

impl SqliteKv {
    /// Open/create the KV database and ensure schema.
    ///
    /// Creates the parent directory if missing.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            // A missing parent surfaces as the sqlite open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let db = Connection::open(db_path)?;
        Self::with_connection(db)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self, StoreError> {
        db.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS kv (
              key         TEXT PRIMARY KEY,
              value       TEXT NOT NULL,
              updated_at  TEXT NOT NULL    -- RFC3339 UTC
            );
            "#,
        )?;
        Ok(Self { db: Mutex::new(db) })
    }
}

impl KvStore for SqliteKv {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let value = db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |r| r.get::<_, String>(0))
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        db.execute(
            r#"
            INSERT INTO kv(key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
              value      = excluded.value,
              updated_at = excluded.updated_at
            "#,
            (key, value, &now),
        )?;
        Ok(())
    }
}
