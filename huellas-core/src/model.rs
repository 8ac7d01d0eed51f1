// huellas-core/src/model.rs
//! Plain data shared by the services and the list controller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetType {
    Dog,
    Cat,
    Bird,
    Rabbit,
    Other,
}

impl PetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PetType::Dog => "dog",
            PetType::Cat => "cat",
            PetType::Bird => "bird",
            PetType::Rabbit => "rabbit",
            PetType::Other => "other",
        }
    }

    /// Lenient parse used by the admin CLI. Unknown names map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "dog" | "perro" => PetType::Dog,
            "cat" | "gato" => PetType::Cat,
            "bird" | "pajaro" | "pájaro" => PetType::Bird,
            "rabbit" | "conejo" => PetType::Rabbit,
            _ => PetType::Other,
        }
    }
}

/// A memorial page. Lives in the remote store; this crate only references it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memorial {
    pub id: Uuid,
    pub name: String,
    pub pet_type: PetType,
    #[serde(default)]
    pub birth_date: Option<NaiveDate>,
    #[serde(default)]
    pub death_date: Option<NaiveDate>,
    #[serde(default)]
    pub short_quote: Option<String>,
    /// Creator's uid. Documents written before ownership existed have none.
    #[serde(default)]
    pub owner_uid: Option<String>,
    pub share_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Memorial {
    /// Build a brand-new memorial with a fresh id and its derived share token.
    pub fn create_new(name: &str, pet_type: PetType, owner_uid: Option<&str>) -> Self {
        let id = Uuid::new_v4();
        let now = Utc::now();
        Self {
            id,
            name: name.trim().to_string(),
            pet_type,
            birth_date: None,
            death_date: None,
            short_quote: None,
            owner_uid: owner_uid.map(str::to_string),
            share_token: share_token_for(&id),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 8 uppercase hex chars of `blake3(id)`. Stable for a given memorial id.
pub fn share_token_for(id: &Uuid) -> String {
    let hex = blake3::hash(id.as_bytes()).to_hex();
    hex.as_str()[..8].to_ascii_uppercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Owned,
    Joined,
}

impl Relationship {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relationship::Owned => "owned",
            Relationship::Joined => "joined",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owned" => Some(Relationship::Owned),
            "joined" => Some(Relationship::Joined),
            _ => None,
        }
    }
}

/// Owned when the memorial's owner is the current user, Joined otherwise.
///
/// Memorials without an owner predate ownership tracking and were always
/// created locally, so they resolve to `Owned`.
pub fn resolve_relationship(current_uid: &str, memorial: &Memorial) -> Relationship {
    match memorial.owner_uid.as_deref() {
        Some(owner) if owner == current_uid => Relationship::Owned,
        Some(_) => Relationship::Joined,
        None => Relationship::Owned,
    }
}

/// One user's positional record for one memorial, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorialOrderEntry {
    pub memorial_id: Uuid,
    pub relationship: Relationship,
    pub sort_index: i64,
    pub is_archived: bool,
}

/// The write shape of an order entry. Merge-upserted, so `is_archived` of
/// an existing entry is never touched by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSlot {
    pub memorial_id: Uuid,
    pub relationship: Relationship,
    pub sort_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub id: Uuid,
    pub memorial_id: Uuid,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Candle {
    /// Blank sender or message are stored as absent.
    pub fn new(memorial_id: Uuid, from_name: Option<&str>, message: Option<&str>) -> Self {
        fn non_blank(s: Option<&str>) -> Option<String> {
            s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
        }
        Self {
            id: Uuid::new_v4(),
            memorial_id,
            from_name: non_blank(from_name),
            message: non_blank(message),
            created_at: Utc::now(),
        }
    }
}

/// A written memory (optionally with a photo link) under one memorial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub memorial_id: Uuid,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(memorial_id: Uuid, title: &str, text: &str, photo_url: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            memorial_id,
            title: title.trim().to_string(),
            text: text.trim().to_string(),
            photo_url: photo_url.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string),
            created_at: Utc::now(),
        }
    }

    pub fn has_photo(&self) -> bool {
        self.photo_url.is_some()
    }
}

/// What the UI renders: the active and archived partitions, each in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalOrderedView {
    pub active: Vec<Memorial>,
    pub archived: Vec<Memorial>,
}

impl LocalOrderedView {
    pub fn is_empty(&self) -> bool {
        self.active.is_empty() && self.archived.is_empty()
    }

    pub fn active_position(&self, id: &Uuid) -> Option<usize> {
        self.active.iter().position(|m| &m.id == id)
    }

    pub fn archived_position(&self, id: &Uuid) -> Option<usize> {
        self.archived.iter().position(|m| &m.id == id)
    }
}
