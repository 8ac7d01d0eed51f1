// huellas-core/src/commands/mod.rs
pub mod init;
mod list;
mod open;

pub use init::{InitReport, ensure_initialized_at, ensure_initialized_once, huellas_root};
pub use list::{MEMORY_PHOTOS, MemorialList};
pub use open::{OpenOptions, open_kv, open_list};
