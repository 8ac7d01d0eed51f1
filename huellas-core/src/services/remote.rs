// huellas-core/src/services/remote.rs
//! Remote entity store seam.
//!
//! The app talks to a hosted document database; this crate only needs the
//! handful of calls below. `SqliteRemote` emulates that store on a local
//! SQLite file so the admin CLI and the tests exercise real persistence:
//!
//!   memorials/{id}                      -> `memorials` (JSON document)
//!   users/{uid}/memorialOrder/{id}      -> `memorial_order`
//!   memorials/{id}/candles/{candleId}   -> `candles`
//!   memorials/{id}/memories/{memoryId}  -> `memories`
//!
//! Statements run on tokio's blocking pool, never on a runtime worker.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::model::{Candle, Memorial, MemorialOrderEntry, Memory, OrderSlot, Relationship};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The user's whole order set, ascending by `sort_index`.
    async fn fetch_order(&self, uid: &str) -> Result<Vec<MemorialOrderEntry>, RemoteError>;

    /// Bulk fetch by id. Ids with no readable document are absent from the result.
    async fn fetch_memorials(&self, ids: &[Uuid]) -> Result<Vec<Memorial>, RemoteError>;

    /// Everything the user can see, oldest first. Only used by the legacy fallback.
    async fn fetch_visible_memorials(&self, uid: &str) -> Result<Vec<Memorial>, RemoteError>;

    async fn upsert_memorial(&self, memorial: &Memorial) -> Result<(), RemoteError>;

    /// Merge-upsert of one order entry; an existing `is_archived` is kept.
    async fn upsert_order_slot(&self, uid: &str, slot: &OrderSlot) -> Result<(), RemoteError>;

    /// All-or-nothing merge-upsert of many order entries.
    async fn write_order_batch(&self, uid: &str, slots: &[OrderSlot]) -> Result<(), RemoteError>;

    /// Flip the archive flag; stamps `archived_at` on archive, clears it on restore.
    async fn set_archived(&self, uid: &str, memorial_id: &Uuid, archived: bool) -> Result<(), RemoteError>;

    async fn find_by_share_token(&self, token: &str) -> Result<Option<Memorial>, RemoteError>;

    async fn add_candle(&self, candle: &Candle) -> Result<(), RemoteError>;

    /// Newest first.
    async fn fetch_candles(&self, memorial_id: &Uuid) -> Result<Vec<Candle>, RemoteError>;

    async fn add_memory(&self, memory: &Memory) -> Result<(), RemoteError>;

    /// Newest first.
    async fn fetch_memories(&self, memorial_id: &Uuid) -> Result<Vec<Memory>, RemoteError>;

    /// Deleting a memory that is already gone is not an error.
    async fn delete_memory(&self, memorial_id: &Uuid, memory_id: &Uuid) -> Result<(), RemoteError>;
}

pub struct SqliteRemote {
    db: Arc<Mutex<Connection>>,
}

impl SqliteRemote {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, RemoteError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RemoteError::Unavailable(format!("create {:?}: {e}", parent)))?;
        }
        Self::with_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self, RemoteError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(db: Connection) -> Result<Self, RemoteError> {
        db.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;

            CREATE TABLE IF NOT EXISTS memorials (
              id           TEXT PRIMARY KEY,
              owner_uid    TEXT,              -- NULL for documents predating ownership
              share_token  TEXT NOT NULL,     -- uppercase, unique per memorial
              doc          TEXT NOT NULL,     -- JSON-encoded Memorial
              created_at   TEXT NOT NULL,     -- RFC3339 UTC
              updated_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memorials_token ON memorials(share_token);
            CREATE INDEX IF NOT EXISTS idx_memorials_owner ON memorials(owner_uid);

            CREATE TABLE IF NOT EXISTS memorial_order (
              uid           TEXT NOT NULL,
              memorial_id   TEXT NOT NULL,
              relationship  TEXT NOT NULL,    -- "owned" | "joined"
              sort_index    INTEGER NOT NULL,
              is_archived   INTEGER NOT NULL DEFAULT 0,
              updated_at    TEXT NOT NULL,    -- store clock, set on every write
              archived_at   TEXT,             -- set on archive, cleared on restore
              PRIMARY KEY (uid, memorial_id)
            );

            CREATE TABLE IF NOT EXISTS candles (
              id           TEXT PRIMARY KEY,
              memorial_id  TEXT NOT NULL,
              doc          TEXT NOT NULL,
              created_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_candles_memorial ON candles(memorial_id, created_at);

            CREATE TABLE IF NOT EXISTS memories (
              id           TEXT PRIMARY KEY,
              memorial_id  TEXT NOT NULL,
              has_photo    INTEGER NOT NULL DEFAULT 0,
              doc          TEXT NOT NULL,
              created_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memories_memorial ON memories(memorial_id, created_at);
            "#,
        )?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RemoteError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|_| RemoteError::Unavailable("remote connection lock poisoned".into()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RemoteError::Unavailable(format!("remote task failed: {e}")))?
    }
}

const UPSERT_SLOT_SQL: &str = r#"
    INSERT INTO memorial_order(uid, memorial_id, relationship, sort_index, is_archived, updated_at)
    VALUES (?1, ?2, ?3, ?4, 0, ?5)
    ON CONFLICT(uid, memorial_id) DO UPDATE SET
      relationship = excluded.relationship,
      sort_index   = excluded.sort_index,
      updated_at   = excluded.updated_at
"#;

/// Unreadable documents are skipped, not fatal: one bad row must not hide the rest.
fn decode_doc<T: serde::de::DeserializeOwned>(kind: &str, doc: &str) -> Option<T> {
    match serde_json::from_str(doc) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(kind, error = %e, "skipping undecodable document");
            None
        }
    }
}

#[async_trait]
impl RemoteStore for SqliteRemote {
    async fn fetch_order(&self, uid: &str) -> Result<Vec<MemorialOrderEntry>, RemoteError> {
        let uid = uid.to_string();
        self.with_conn(move |db| {
            let mut stmt = db.prepare(
                "SELECT memorial_id, relationship, sort_index, is_archived
                 FROM memorial_order
                 WHERE uid = ?1
                 ORDER BY sort_index ASC, updated_at ASC",
            )?;
            let rows = stmt.query_map([&uid], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, bool>(3)?,
                ))
            })?;

            let mut out = Vec::new();
            for row in rows {
                let (id, rel, sort_index, is_archived) = row?;
                // Entries with an unreadable id or relationship are skipped, not fatal.
                let (Ok(memorial_id), Some(relationship)) = (Uuid::parse_str(&id), Relationship::parse(&rel)) else {
                    tracing::debug!(uid = %uid, id = %id, rel = %rel, "skipping malformed order entry");
                    continue;
                };
                out.push(MemorialOrderEntry {
                    memorial_id,
                    relationship,
                    sort_index,
                    is_archived,
                });
            }
            Ok(out)
        })
        .await
    }

    async fn fetch_memorials(&self, ids: &[Uuid]) -> Result<Vec<Memorial>, RemoteError> {
        let ids = ids.to_vec();
        self.with_conn(move |db| {
            let mut stmt = db.prepare("SELECT doc FROM memorials WHERE id = ?1")?;
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                let doc = stmt
                    .query_row([id.to_string()], |r| r.get::<_, String>(0))
                    .optional()?;
                if let Some(m) = doc.and_then(|d| decode_doc::<Memorial>("memorial", &d)) {
                    out.push(m);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn fetch_visible_memorials(&self, uid: &str) -> Result<Vec<Memorial>, RemoteError> {
        let uid = uid.to_string();
        self.with_conn(move |db| {
            let mut stmt = db.prepare(
                "SELECT doc FROM memorials
                 WHERE owner_uid = ?1 OR owner_uid IS NULL
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map([&uid], |r| r.get::<_, String>(0))?;
            let mut out = Vec::new();
            for doc in rows {
                if let Some(m) = decode_doc::<Memorial>("memorial", &doc?) {
                    out.push(m);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn upsert_memorial(&self, memorial: &Memorial) -> Result<(), RemoteError> {
        let doc = serde_json::to_string(memorial)?;
        let memorial = memorial.clone();
        self.with_conn(move |db| {
            db.execute(
                r#"
                INSERT INTO memorials(id, owner_uid, share_token, doc, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                  owner_uid   = COALESCE(excluded.owner_uid, memorials.owner_uid),
                  share_token = excluded.share_token,
                  doc         = excluded.doc,
                  updated_at  = excluded.updated_at
                "#,
                (
                    memorial.id.to_string(),
                    memorial.owner_uid.as_deref(),
                    memorial.share_token.to_uppercase(),
                    &doc,
                    memorial.created_at.to_rfc3339(),
                    memorial.updated_at.to_rfc3339(),
                ),
            )?;
            Ok(())
        })
        .await
    }

    async fn upsert_order_slot(&self, uid: &str, slot: &OrderSlot) -> Result<(), RemoteError> {
        let uid = uid.to_string();
        let slot = slot.clone();
        self.with_conn(move |db| {
            let now = Utc::now().to_rfc3339();
            db.execute(
                UPSERT_SLOT_SQL,
                (
                    &uid,
                    slot.memorial_id.to_string(),
                    slot.relationship.as_str(),
                    slot.sort_index,
                    &now,
                ),
            )?;
            Ok(())
        })
        .await
    }

    async fn write_order_batch(&self, uid: &str, slots: &[OrderSlot]) -> Result<(), RemoteError> {
        let uid = uid.to_string();
        let slots = slots.to_vec();
        self.with_conn(move |db| {
            let now = Utc::now().to_rfc3339();
            let tx = db.transaction()?;
            {
                let mut stmt = tx.prepare(UPSERT_SLOT_SQL)?;
                for slot in &slots {
                    stmt.execute((
                        &uid,
                        slot.memorial_id.to_string(),
                        slot.relationship.as_str(),
                        slot.sort_index,
                        &now,
                    ))?;
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_archived(&self, uid: &str, memorial_id: &Uuid, archived: bool) -> Result<(), RemoteError> {
        let uid = uid.to_string();
        let memorial_id = *memorial_id;
        self.with_conn(move |db| {
            let now = Utc::now().to_rfc3339();
            let changed = db.execute(
                r#"
                UPDATE memorial_order SET
                  is_archived = ?3,
                  archived_at = CASE WHEN ?3 THEN ?4 ELSE NULL END,
                  updated_at  = ?4
                WHERE uid = ?1 AND memorial_id = ?2
                "#,
                (&uid, memorial_id.to_string(), archived, &now),
            )?;
            if changed == 0 {
                return Err(RemoteError::Unavailable(format!(
                    "no order entry for memorial {memorial_id}"
                )));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_share_token(&self, token: &str) -> Result<Option<Memorial>, RemoteError> {
        let token = token.to_uppercase();
        self.with_conn(move |db| {
            let doc = db
                .query_row(
                    "SELECT doc FROM memorials WHERE share_token = ?1 LIMIT 1",
                    [&token],
                    |r| r.get::<_, String>(0),
                )
                .optional()?;
            Ok(doc.and_then(|d| decode_doc::<Memorial>("memorial", &d)))
        })
        .await
    }

    async fn add_candle(&self, candle: &Candle) -> Result<(), RemoteError> {
        let doc = serde_json::to_string(candle)?;
        let (id, memorial_id, created_at) =
            (candle.id.to_string(), candle.memorial_id.to_string(), candle.created_at.to_rfc3339());
        self.with_conn(move |db| {
            db.execute(
                "INSERT INTO candles(id, memorial_id, doc, created_at) VALUES (?1, ?2, ?3, ?4)",
                (&id, &memorial_id, &doc, &created_at),
            )?;
            Ok(())
        })
        .await
    }

    async fn fetch_candles(&self, memorial_id: &Uuid) -> Result<Vec<Candle>, RemoteError> {
        let memorial_id = memorial_id.to_string();
        self.with_conn(move |db| {
            let mut stmt = db.prepare(
                "SELECT doc FROM candles WHERE memorial_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([&memorial_id], |r| r.get::<_, String>(0))?;
            let mut out = Vec::new();
            for doc in rows {
                if let Some(c) = decode_doc::<Candle>("candle", &doc?) {
                    out.push(c);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn add_memory(&self, memory: &Memory) -> Result<(), RemoteError> {
        let doc = serde_json::to_string(memory)?;
        let (id, memorial_id, has_photo, created_at) = (
            memory.id.to_string(),
            memory.memorial_id.to_string(),
            memory.has_photo(),
            memory.created_at.to_rfc3339(),
        );
        self.with_conn(move |db| {
            db.execute(
                r#"
                INSERT INTO memories(id, memorial_id, has_photo, doc, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET
                  has_photo = excluded.has_photo,
                  doc       = excluded.doc
                "#,
                (&id, &memorial_id, has_photo, &doc, &created_at),
            )?;
            Ok(())
        })
        .await
    }

    async fn fetch_memories(&self, memorial_id: &Uuid) -> Result<Vec<Memory>, RemoteError> {
        let memorial_id = memorial_id.to_string();
        self.with_conn(move |db| {
            let mut stmt = db.prepare(
                "SELECT doc FROM memories WHERE memorial_id = ?1 ORDER BY created_at DESC",
            )?;
            let rows = stmt.query_map([&memorial_id], |r| r.get::<_, String>(0))?;
            let mut out = Vec::new();
            for doc in rows {
                if let Some(m) = decode_doc::<Memory>("memory", &doc?) {
                    out.push(m);
                }
            }
            Ok(out)
        })
        .await
    }

    async fn delete_memory(&self, memorial_id: &Uuid, memory_id: &Uuid) -> Result<(), RemoteError> {
        let (memorial_id, memory_id) = (memorial_id.to_string(), memory_id.to_string());
        self.with_conn(move |db| {
            db.execute(
                "DELETE FROM memories WHERE memorial_id = ?1 AND id = ?2",
                (&memorial_id, &memory_id),
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
impl SqliteRemote {
    /// `(updated_at, archived_at)` of one order entry.
    fn order_timestamps(&self, uid: &str, memorial_id: &Uuid) -> Option<(String, Option<String>)> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT updated_at, archived_at FROM memorial_order WHERE uid=?1 AND memorial_id=?2",
            (uid, memorial_id.to_string()),
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)),
        )
        .optional()
        .unwrap()
    }

    fn insert_raw_memorial(&self, id: &str, owner_uid: &str, doc: &str) {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO memorials(id, owner_uid, share_token, doc, created_at, updated_at)
             VALUES (?1, ?2, 'BROKEN00', ?3, '2000-01-01T00:00:00Z', '2000-01-01T00:00:00Z')",
            (id, owner_uid, doc),
        )
        .unwrap();
    }
}
