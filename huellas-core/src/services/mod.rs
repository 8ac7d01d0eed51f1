// huellas-core/src/services/mod.rs

pub mod entitlements; // premium flag, injected (no global)
pub mod identity;     // current uid, or none
pub mod journal;      // device-local grief journal over the KV store
pub mod kv;           // local key-value persistence
pub mod quota;        // free-tier caps per calendar period
pub mod remote;       // remote document store seam + SQLite emulator
pub mod routines;     // coping routine catalog + completion progress
pub mod sync;         // order projection + fire-and-forget persistence

// Public API
pub use entitlements::Entitlements;
pub use identity::{IdentityProvider, StaticIdentity};
pub use journal::{JournalEntry, JournalMood, JournalStore};
pub use kv::{KvStore, SqliteKv};
pub use quota::{Admission, Clock, ManualClock, PeriodKind, QuotaPolicy, QuotaTracker, QuotaWindow, SystemClock};
pub use remote::{RemoteStore, SqliteRemote};
pub use routines::{CATALOG as ROUTINES, Routine, RoutineProgress, find_routine};
pub use sync::{OrderSynchronizer, PersistIntent, PersistQueue, SyncEvent};
