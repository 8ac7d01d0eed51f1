// huellas-core/src/utils/mod.rs
pub mod logbook;
pub mod token;

pub use logbook::Logbook;
pub use token::normalize_share_token;
