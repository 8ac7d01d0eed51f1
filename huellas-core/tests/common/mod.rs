// Shared test doubles for the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::runtime::Handle;
use uuid::Uuid;

use huellas_core::services::{
    Entitlements, ManualClock, OrderSynchronizer, QuotaTracker, RemoteStore, SqliteKv, SqliteRemote,
    StaticIdentity,
};
use huellas_core::{Candle, Memorial, MemorialList, MemorialOrderEntry, Memory, OrderSlot, RemoteError};

/// SQLite-backed remote that records every call and can be told to fail ops.
pub struct RecordingRemote {
    pub inner: SqliteRemote,
    calls: Mutex<Vec<String>>,
    batches: Mutex<Vec<Vec<OrderSlot>>>,
    failing: Mutex<HashSet<&'static str>>,
}

impl RecordingRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: SqliteRemote::open_in_memory().expect("in-memory remote"),
            calls: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
        })
    }

    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.split(':').next() == Some(op))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
        self.batches.lock().unwrap().clear();
    }

    pub fn batches(&self) -> Vec<Vec<OrderSlot>> {
        self.batches.lock().unwrap().clone()
    }

    fn enter(&self, op: &'static str, detail: &str) -> Result<(), RemoteError> {
        let entry = if detail.is_empty() { op.to_string() } else { format!("{op}:{detail}") };
        self.calls.lock().unwrap().push(entry);
        if self.failing.lock().unwrap().contains(op) {
            return Err(RemoteError::Unavailable(format!("{op} failed (injected)")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for RecordingRemote {
    async fn fetch_order(&self, uid: &str) -> Result<Vec<MemorialOrderEntry>, RemoteError> {
        self.enter("fetch_order", uid)?;
        self.inner.fetch_order(uid).await
    }

    async fn fetch_memorials(&self, ids: &[Uuid]) -> Result<Vec<Memorial>, RemoteError> {
        self.enter("fetch_memorials", "")?;
        self.inner.fetch_memorials(ids).await
    }

    async fn fetch_visible_memorials(&self, uid: &str) -> Result<Vec<Memorial>, RemoteError> {
        self.enter("fetch_visible_memorials", uid)?;
        self.inner.fetch_visible_memorials(uid).await
    }

    async fn upsert_memorial(&self, memorial: &Memorial) -> Result<(), RemoteError> {
        self.enter("upsert_memorial", &memorial.id.to_string())?;
        self.inner.upsert_memorial(memorial).await
    }

    async fn upsert_order_slot(&self, uid: &str, slot: &OrderSlot) -> Result<(), RemoteError> {
        self.enter("upsert_order_slot", &slot.memorial_id.to_string())?;
        self.inner.upsert_order_slot(uid, slot).await
    }

    async fn write_order_batch(&self, uid: &str, slots: &[OrderSlot]) -> Result<(), RemoteError> {
        self.enter("write_order_batch", "")?;
        self.batches.lock().unwrap().push(slots.to_vec());
        self.inner.write_order_batch(uid, slots).await
    }

    async fn set_archived(&self, uid: &str, memorial_id: &Uuid, archived: bool) -> Result<(), RemoteError> {
        self.enter("set_archived", &format!("{memorial_id}={archived}"))?;
        self.inner.set_archived(uid, memorial_id, archived).await
    }

    async fn find_by_share_token(&self, token: &str) -> Result<Option<Memorial>, RemoteError> {
        self.enter("find_by_share_token", token)?;
        self.inner.find_by_share_token(token).await
    }

    async fn add_candle(&self, candle: &Candle) -> Result<(), RemoteError> {
        self.enter("add_candle", &candle.memorial_id.to_string())?;
        self.inner.add_candle(candle).await
    }

    async fn fetch_candles(&self, memorial_id: &Uuid) -> Result<Vec<Candle>, RemoteError> {
        self.enter("fetch_candles", &memorial_id.to_string())?;
        self.inner.fetch_candles(memorial_id).await
    }

    async fn add_memory(&self, memory: &Memory) -> Result<(), RemoteError> {
        self.enter("add_memory", &memory.memorial_id.to_string())?;
        self.inner.add_memory(memory).await
    }

    async fn fetch_memories(&self, memorial_id: &Uuid) -> Result<Vec<Memory>, RemoteError> {
        self.enter("fetch_memories", &memorial_id.to_string())?;
        self.inner.fetch_memories(memorial_id).await
    }

    async fn delete_memory(&self, memorial_id: &Uuid, memory_id: &Uuid) -> Result<(), RemoteError> {
        self.enter("delete_memory", &memory_id.to_string())?;
        self.inner.delete_memory(memorial_id, memory_id).await
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// A list controller over `remote`, with free limits 2 candles/day and 3 messages/month.
pub fn list_for(
    remote: &Arc<RecordingRemote>,
    uid: Option<&str>,
    clock: Arc<ManualClock>,
    entitlements: Entitlements,
) -> MemorialList {
    let identity = match uid {
        Some(u) => StaticIdentity::signed_in(u),
        None => StaticIdentity::anonymous(),
    };
    let kv = Arc::new(SqliteKv::open_in_memory().expect("in-memory kv"));
    let quota = QuotaTracker::with_defaults(kv, clock, 2, 3);
    let sync = Arc::new(OrderSynchronizer::new(remote.clone(), Arc::new(identity)));
    MemorialList::new(sync, quota, entitlements, Handle::current())
}

pub fn free_list(remote: &Arc<RecordingRemote>, uid: &str) -> MemorialList {
    list_for(remote, Some(uid), Arc::new(ManualClock::new(day(2025, 12, 10))), Entitlements::free())
}
