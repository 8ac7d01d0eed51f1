// huellas-core/src/error.rs
//! Typed failures surfaced by the library.
//!
//! Background persistence failures never show up here: they are logged
//! and, for archive flips, healed by a reload (see `services::sync`).

use thiserror::Error;

/// Local key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("kv connection lock poisoned")]
    Poisoned,
    #[error("value codec: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("value for key `{key}` is not a valid {expected}: {raw:?}")]
    Parse {
        key: String,
        expected: &'static str,
        raw: String,
    },
}

/// Remote entity store failures (network, backend, codec).
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("document codec: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("no quota policy registered for feature `{0}`")]
    UnknownFeature(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of join-by-share-token; the only write path that reports back.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error("share token is empty")]
    InvalidInput,
    #[error("no memorial matches share token {0}")]
    NotFound(String),
    #[error("joining a memorial needs a signed-in user")]
    NotSignedIn,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not load memorial order: {0}")]
    Remote(#[from] RemoteError),
}

/// A gated action (candle, comfort message, memory photo) that was refused or could not be checked.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("free limit of {limit} reached for `{feature}`")]
    LimitReached { feature: String, limit: u32 },
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
