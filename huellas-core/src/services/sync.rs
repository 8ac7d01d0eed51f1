// huellas-core/src/services/sync.rs
//! Ordered, partitioned memorial collection kept in the remote store.
//!
//! Two halves:
//! - `OrderSynchronizer` knows how to read the order set back into a
//!   `LocalOrderedView` and how to carry out one `PersistIntent`.
//! - `PersistQueue` fires one tokio task per intent. Tasks are never awaited
//!   by the caller, never cancelled and not ordered relative to each other.
//!   Failures are logged; a failed archive flip reloads the order and ships
//!   the fresh view back through a `SyncEvent`.
//!
//! Without a signed-in user every call here is a logged no-op.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::RemoteError;
use crate::model::{Candle, LocalOrderedView, Memorial, Memory, OrderSlot};
use crate::services::identity::IdentityProvider;
use crate::services::remote::RemoteStore;
use crate::utils::Logbook;

/// A remote write the UI has already applied locally.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistIntent {
    /// New memorial document plus its `owned` order entry.
    CreateMemorial { memorial: Memorial, slot: OrderSlot },
    /// Order entry for a memorial joined by share token.
    TrackJoined { slot: OrderSlot },
    /// Full overwrite of `sort_index` 0..N-1 after a drag-to-reorder.
    SaveFullOrder { slots: Vec<OrderSlot> },
    /// Single archive-flag flip.
    SetArchived { memorial_id: Uuid, archived: bool },
    AddCandle { candle: Candle },
    AddMemory { memory: Memory },
    DeleteMemory { memorial_id: Uuid, memory_id: Uuid },
}

impl PersistIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            PersistIntent::CreateMemorial { .. } => "create_memorial",
            PersistIntent::TrackJoined { .. } => "track_joined",
            PersistIntent::SaveFullOrder { .. } => "save_full_order",
            PersistIntent::SetArchived { .. } => "set_archived",
            PersistIntent::AddCandle { .. } => "add_candle",
            PersistIntent::AddMemory { .. } => "add_memory",
            PersistIntent::DeleteMemory { .. } => "delete_memory",
        }
    }

    /// A lost archive flip leaves an item in the wrong partition, which is
    /// visible; those reload. Everything else trusts local state until the
    /// next natural load.
    pub fn resyncs_on_failure(&self) -> bool {
        matches!(self, PersistIntent::SetArchived { .. })
    }
}

/// Results reported back by background persistence tasks.
#[derive(Debug)]
pub enum SyncEvent {
    PersistFailed { kind: &'static str, error: String },
    /// Corrective reload after a failed archive flip; replaces local state.
    Reloaded(LocalOrderedView),
    ReloadFailed { error: String },
}

pub struct OrderSynchronizer {
    remote: Arc<dyn RemoteStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl OrderSynchronizer {
    pub fn new(remote: Arc<dyn RemoteStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { remote, identity }
    }

    pub fn current_uid(&self) -> Option<String> {
        self.identity.current_uid()
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    /// Read the user's order set and project memorials into active/archived.
    ///
    /// - Empty order set: legacy fallback, every visible memorial is active,
    ///   nothing archived, nothing written back.
    /// - Ids in the order set whose memorial is gone are dropped silently.
    pub async fn load_order(&self) -> Result<LocalOrderedView, RemoteError> {
        let Some(uid) = self.current_uid() else {
            tracing::debug!("load_order without a signed-in user");
            return Ok(LocalOrderedView::default());
        };

        let order = self.remote.fetch_order(&uid).await?;
        if order.is_empty() {
            let active = self.remote.fetch_visible_memorials(&uid).await?;
            tracing::info!(uid = %uid, count = active.len(), "no order set; using unordered legacy fetch");
            return Ok(LocalOrderedView {
                active,
                archived: Vec::new(),
            });
        }

        let ids: Vec<Uuid> = order.iter().map(|e| e.memorial_id).collect();
        let mut by_id: HashMap<Uuid, Memorial> = self
            .remote
            .fetch_memorials(&ids)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();

        let mut view = LocalOrderedView::default();
        let mut missing = 0usize;
        // `order` is already ascending by sort_index; walking it keeps that order per partition.
        for entry in &order {
            match by_id.remove(&entry.memorial_id) {
                Some(m) if entry.is_archived => view.archived.push(m),
                Some(m) => view.active.push(m),
                None => missing += 1,
            }
        }
        if missing > 0 {
            tracing::debug!(uid = %uid, missing, "order entries without a memorial were dropped");
        }
        tracing::debug!(
            uid = %uid,
            active = view.active.len(),
            archived = view.archived.len(),
            "order loaded"
        );
        Ok(view)
    }

    /// Carry out one intent against the remote store.
    pub async fn execute(&self, intent: &PersistIntent) -> Result<(), RemoteError> {
        let Some(uid) = self.current_uid() else {
            tracing::debug!(intent = intent.kind(), "skipping write without a signed-in user");
            return Ok(());
        };

        match intent {
            PersistIntent::CreateMemorial { memorial, slot } => {
                self.remote.upsert_memorial(memorial).await?;
                self.remote.upsert_order_slot(&uid, slot).await
            }
            PersistIntent::TrackJoined { slot } => self.remote.upsert_order_slot(&uid, slot).await,
            PersistIntent::SaveFullOrder { slots } => self.remote.write_order_batch(&uid, slots).await,
            PersistIntent::SetArchived { memorial_id, archived } => {
                self.remote.set_archived(&uid, memorial_id, *archived).await
            }
            PersistIntent::AddCandle { candle } => self.remote.add_candle(candle).await,
            PersistIntent::AddMemory { memory } => self.remote.add_memory(memory).await,
            PersistIntent::DeleteMemory { memorial_id, memory_id } => {
                self.remote.delete_memory(memorial_id, memory_id).await
            }
        }
    }
}

/// Fire-and-forget executor for `PersistIntent`s.
pub struct PersistQueue {
    sync: Arc<OrderSynchronizer>,
    handle: Handle,
    events_tx: UnboundedSender<SyncEvent>,
    events_rx: UnboundedReceiver<SyncEvent>,
    in_flight: Vec<JoinHandle<()>>,
    logbook: Option<Logbook>,
}

impl PersistQueue {
    /// Captures `handle` so intents can be submitted from synchronous UI code.
    pub fn new(sync: Arc<OrderSynchronizer>, handle: Handle) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            sync,
            handle,
            events_tx,
            events_rx,
            in_flight: Vec::new(),
            logbook: None,
        }
    }

    pub fn with_logbook(mut self, logbook: Logbook) -> Self {
        self.logbook = Some(logbook);
        self
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.iter().filter(|h| !h.is_finished()).count()
    }

    /// Spawn one independent task for `intent` and return immediately.
    pub fn submit(&mut self, intent: PersistIntent) {
        self.in_flight.retain(|h| !h.is_finished());

        let sync = Arc::clone(&self.sync);
        let tx = self.events_tx.clone();
        let logbook = self.logbook.clone();
        tracing::debug!(intent = intent.kind(), "persist intent submitted");

        let task = self.handle.spawn(async move {
            let Err(e) = sync.execute(&intent).await else {
                return;
            };
            let kind = intent.kind();
            tracing::warn!(intent = kind, error = %e, "background persist failed");
            if let Some(book) = &logbook {
                book.record("persist_failed", json!({ "intent": kind, "error": e.to_string() }));
            }
            // Receiver gone means the controller was dropped; nobody is left to tell.
            let _ = tx.send(SyncEvent::PersistFailed {
                kind,
                error: e.to_string(),
            });

            if intent.resyncs_on_failure() {
                match sync.load_order().await {
                    Ok(view) => {
                        let _ = tx.send(SyncEvent::Reloaded(view));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "corrective reload failed");
                        let _ = tx.send(SyncEvent::ReloadFailed { error: e.to_string() });
                    }
                }
            }
        });
        self.in_flight.push(task);
    }

    /// Everything reported so far, without waiting.
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events_rx.try_recv() {
            out.push(ev);
        }
        out
    }

    /// Wait for every submitted task to finish. A panicking task is logged.
    pub async fn wait_idle(&mut self) {
        for task in std::mem::take(&mut self.in_flight) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "persist task aborted");
            }
        }
    }
}
