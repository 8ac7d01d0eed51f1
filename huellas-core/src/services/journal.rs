// huellas-core/src/services/journal.rs
//! Private grief journal, kept on the device only.
//!
//! The whole journal is one JSON array under `journal_entries_v1` in the
//! local KV store; every change rewrites it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreError;
use crate::services::kv::KvStore;

pub const JOURNAL_KEY: &str = "journal_entries_v1";

/// Stored by its Spanish label so existing device data keeps decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JournalMood {
    #[serde(rename = "Muy triste")]
    VerySad,
    #[serde(rename = "Triste")]
    Sad,
    #[serde(rename = "Reflexivo")]
    Reflective,
    #[serde(rename = "En paz")]
    Peaceful,
    #[serde(rename = "Agradecido")]
    Grateful,
}

impl JournalMood {
    pub const ALL: [JournalMood; 5] = [
        JournalMood::VerySad,
        JournalMood::Sad,
        JournalMood::Reflective,
        JournalMood::Peaceful,
        JournalMood::Grateful,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            JournalMood::VerySad => "Muy triste",
            JournalMood::Sad => "Triste",
            JournalMood::Reflective => "Reflexivo",
            JournalMood::Peaceful => "En paz",
            JournalMood::Grateful => "Agradecido",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            JournalMood::VerySad => "😭",
            JournalMood::Sad => "😢",
            JournalMood::Reflective => "🤍",
            JournalMood::Peaceful => "🕊",
            JournalMood::Grateful => "🙏",
        }
    }

    /// Accepts the label or a snake_case name (`very_sad`), any case.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.label().to_lowercase() == wanted || m.snake_name() == wanted)
    }

    fn snake_name(&self) -> &'static str {
        match self {
            JournalMood::VerySad => "very_sad",
            JournalMood::Sad => "sad",
            JournalMood::Reflective => "reflective",
            JournalMood::Peaceful => "peaceful",
            JournalMood::Grateful => "grateful",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub mood: JournalMood,
    pub text: String,
}

pub struct JournalStore {
    kv: Arc<dyn KvStore>,
}

impl JournalStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Newest first. An unreadable journal reads as empty rather than failing.
    pub fn entries(&self) -> Result<Vec<JournalEntry>, StoreError> {
        let Some(raw) = self.kv.get_string(JOURNAL_KEY)? else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<JournalEntry> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "journal payload unreadable; starting empty");
                return Ok(Vec::new());
            }
        };
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    pub fn add(&self, mood: JournalMood, text: &str) -> Result<JournalEntry, StoreError> {
        let entry = JournalEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            mood,
            text: text.trim().to_string(),
        };
        let mut entries = self.entries()?;
        entries.insert(0, entry.clone());
        self.save(&entries)?;
        tracing::debug!(entry = %entry.id, mood = entry.mood.label(), "journal entry added");
        Ok(entry)
    }

    /// Returns false when no entry had that id.
    pub fn delete(&self, id: &Uuid) -> Result<bool, StoreError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.save(&entries)?;
        Ok(true)
    }

    fn save(&self, entries: &[JournalEntry]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entries)?;
        self.kv.set_string(JOURNAL_KEY, &raw)
    }
}
