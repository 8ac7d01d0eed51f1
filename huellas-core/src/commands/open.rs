// huellas-core/src/commands/open.rs
//! Wire a `MemorialList` from a loaded config: SQLite KV for the quota
//! counters, the SQLite remote emulator, and the optional logbook.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::commands::list::MemorialList;
use crate::config::CoreConfig;
use crate::services::{
    Clock, Entitlements, IdentityProvider, OrderSynchronizer, QuotaTracker, RemoteStore, SqliteKv,
    SqliteRemote, SystemClock,
};
use crate::utils::Logbook;

pub struct OpenOptions {
    pub identity: Arc<dyn IdentityProvider>,
    pub entitlements: Entitlements,
    pub clock: Arc<dyn Clock>,
    /// Overrides the SQLite emulator from `[storage] remote_path`.
    pub remote: Option<Arc<dyn RemoteStore>>,
}

impl OpenOptions {
    pub fn new(identity: Arc<dyn IdentityProvider>, entitlements: Entitlements) -> Self {
        Self {
            identity,
            entitlements,
            clock: Arc::new(SystemClock),
            remote: None,
        }
    }
}

/// The device-local KV store (quota counters, journal, routine progress).
pub fn open_kv(config: &CoreConfig) -> Result<Arc<SqliteKv>> {
    let kv = SqliteKv::open(&config.storage.kv_path)
        .with_context(|| format!("open kv store {}", config.storage.kv_path.display()))?;
    Ok(Arc::new(kv))
}

pub fn open_list(config: &CoreConfig, opts: OpenOptions, handle: Handle) -> Result<MemorialList> {
    let kv = open_kv(config)?;

    let remote: Arc<dyn RemoteStore> = match opts.remote {
        Some(r) => r,
        None => Arc::new(
            SqliteRemote::open(&config.storage.remote_path)
                .with_context(|| format!("open remote store {}", config.storage.remote_path.display()))?,
        ),
    };

    let logbook = if config.logbook.enabled {
        Some(Logbook::open(&config.logbook.path)?)
    } else {
        None
    };

    let mut quota = QuotaTracker::with_defaults(
        kv,
        opts.clock,
        config.quota.candles_per_day,
        config.quota.ai_messages_per_month,
    );
    if let Some(book) = &logbook {
        quota = quota.with_logbook(book.clone());
    }

    let sync = Arc::new(OrderSynchronizer::new(remote, opts.identity));
    let mut list = MemorialList::new(sync, quota, opts.entitlements, handle)
        .with_photo_limit(config.quota.free_photos_per_memorial);
    if let Some(book) = logbook {
        list = list.with_logbook(book);
    }
    Ok(list)
}
