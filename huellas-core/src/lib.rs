// huellas-core/src/lib.rs
//! Huellas-Core: the logic behind the memorial list and free-tier limits.
//!
//! - `services::quota` gates candles (daily) and AI comfort messages (monthly).
//! - `services::sync` keeps a user's memorial order in a remote document store.
//! - `commands::MemorialList` is the list controller the UI talks to: it
//!   mutates local state first and hands persistence to background tasks.

pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod utils;

pub use commands::{InitReport, MemorialList, ensure_initialized_at, ensure_initialized_once};
pub use config::CoreConfig;
pub use error::{GateError, JoinError, QuotaError, RemoteError, StoreError, SyncError};
pub use model::{
    Candle, LocalOrderedView, Memorial, MemorialOrderEntry, Memory, OrderSlot, PetType, Relationship,
};
