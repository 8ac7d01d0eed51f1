// huellas-core/src/commands/list.rs
//! `MemorialList`: the list controller behind the memorials screen.
//!
//! Every mutating call updates the in-memory view first and returns; the
//! matching remote write is handed to the `PersistQueue`. The view is owned
//! here and only mutated through `&mut self`, i.e. from the UI task.

use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::error::{GateError, JoinError, RemoteError, SyncError};
use crate::model::{
    Candle, LocalOrderedView, Memorial, Memory, OrderSlot, PetType, Relationship,
    resolve_relationship,
};
use crate::services::entitlements::Entitlements;
use crate::services::quota::{AI_MESSAGES, Admission, CANDLES, QuotaTracker};
use crate::services::remote::RemoteStore;
use crate::services::sync::{OrderSynchronizer, PersistIntent, PersistQueue, SyncEvent};
use crate::utils::{Logbook, normalize_share_token};

/// Gate name reported when a free user is out of photo memories.
pub const MEMORY_PHOTOS: &str = "memory_photos";

const DEFAULT_FREE_PHOTOS_PER_MEMORIAL: u32 = 3;

pub struct MemorialList {
    view: LocalOrderedView,
    sync: Arc<OrderSynchronizer>,
    queue: PersistQueue,
    quota: QuotaTracker,
    entitlements: Entitlements,
    free_photos_per_memorial: u32,
    load_error: Option<String>,
}

impl MemorialList {
    pub fn new(
        sync: Arc<OrderSynchronizer>,
        quota: QuotaTracker,
        entitlements: Entitlements,
        handle: Handle,
    ) -> Self {
        let queue = PersistQueue::new(Arc::clone(&sync), handle);
        Self {
            view: LocalOrderedView::default(),
            sync,
            queue,
            quota,
            entitlements,
            free_photos_per_memorial: DEFAULT_FREE_PHOTOS_PER_MEMORIAL,
            load_error: None,
        }
    }

    pub fn with_logbook(mut self, logbook: Logbook) -> Self {
        self.queue = self.queue.with_logbook(logbook);
        self
    }

    /// Photo memories a free user may keep per memorial (at least 1).
    pub fn with_photo_limit(mut self, per_memorial: u32) -> Self {
        self.free_photos_per_memorial = per_memorial.max(1);
        self
    }

    // ---------- read side ----------

    pub fn active(&self) -> &[Memorial] {
        &self.view.active
    }

    pub fn archived(&self) -> &[Memorial] {
        &self.view.archived
    }

    pub fn view(&self) -> &LocalOrderedView {
        &self.view
    }

    pub fn find(&self, id: &Uuid) -> Option<&Memorial> {
        self.view
            .active
            .iter()
            .chain(self.view.archived.iter())
            .find(|m| &m.id == id)
    }

    /// User-facing text of the last failed `load`, cleared by a successful one.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        self.sync.remote()
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn entitlements(&self) -> &Entitlements {
        &self.entitlements
    }

    pub fn in_flight(&self) -> usize {
        self.queue.in_flight()
    }

    // ---------- load ----------

    /// Replace local state wholesale with what the remote store holds.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        match self.sync.load_order().await {
            Ok(view) => {
                self.view = view;
                self.load_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "memorial load failed");
                self.load_error = Some("Your memorials could not be loaded.".to_string());
                Err(e.into())
            }
        }
    }

    // ---------- optimistic mutations ----------

    /// New memorial owned by the signed-in user.
    pub fn create_memorial(&mut self, name: &str, pet_type: PetType) -> Memorial {
        let uid = self.sync.current_uid();
        let memorial = Memorial::create_new(name, pet_type, uid.as_deref());
        self.create_and_track_new(memorial.clone(), Relationship::Owned);
        memorial
    }

    /// Append to the active list, then persist the document and its order entry.
    pub fn create_and_track_new(&mut self, memorial: Memorial, relationship: Relationship) {
        self.view.active.push(memorial.clone());
        let slot = OrderSlot {
            memorial_id: memorial.id,
            relationship,
            sort_index: (self.view.active.len() - 1) as i64,
        };
        self.persist(PersistIntent::CreateMemorial { memorial, slot });
    }

    /// Move the items at `from` (positions in the active list) as one block so
    /// that it starts at `to` in the list left after removing them.
    ///
    /// Relationships are re-derived for every item and the whole order is
    /// rewritten remotely as `sort_index` 0..N-1, even when nothing moved.
    pub fn reorder(&mut self, from: &[usize], to: usize) {
        move_block(&mut self.view.active, from, to);

        let Some(uid) = self.sync.current_uid() else {
            tracing::debug!("reorder applied locally only: no signed-in user");
            return;
        };
        let slots = self
            .view
            .active
            .iter()
            .enumerate()
            .map(|(i, m)| OrderSlot {
                memorial_id: m.id,
                relationship: resolve_relationship(&uid, m),
                sort_index: i as i64,
            })
            .collect();
        self.persist(PersistIntent::SaveFullOrder { slots });
    }

    /// Active -> archived. Returns false if `id` was not in the active list.
    pub fn archive(&mut self, id: &Uuid) -> bool {
        let Some(pos) = self.view.active_position(id) else {
            tracing::debug!(memorial = %id, "archive ignored: not active");
            return false;
        };
        let m = self.view.active.remove(pos);
        self.view.archived.push(m);
        self.persist(PersistIntent::SetArchived {
            memorial_id: *id,
            archived: true,
        });
        true
    }

    /// Archived -> active (appended). Returns false if `id` was not archived.
    pub fn restore(&mut self, id: &Uuid) -> bool {
        let Some(pos) = self.view.archived_position(id) else {
            tracing::debug!(memorial = %id, "restore ignored: not archived");
            return false;
        };
        let m = self.view.archived.remove(pos);
        self.view.active.push(m);
        self.persist(PersistIntent::SetArchived {
            memorial_id: *id,
            archived: false,
        });
        true
    }

    /// Join someone else's memorial from a pasted token or share link.
    ///
    /// Already-active memorials are returned without any remote call; an
    /// archived one is restored rather than duplicated.
    pub async fn join_by_token(&mut self, input: &str) -> Result<Memorial, JoinError> {
        let token = normalize_share_token(input).ok_or(JoinError::InvalidInput)?;

        if let Some(m) = self
            .view
            .active
            .iter()
            .find(|m| m.share_token.eq_ignore_ascii_case(&token))
        {
            return Ok(m.clone());
        }
        if let Some(id) = self
            .view
            .archived
            .iter()
            .find(|m| m.share_token.eq_ignore_ascii_case(&token))
            .map(|m| m.id)
        {
            self.restore(&id);
            return self.find(&id).cloned().ok_or(JoinError::NotFound(token));
        }

        // No uid, no order entry to write.
        if self.sync.current_uid().is_none() {
            tracing::debug!(token = %token, "join refused: no signed-in user");
            return Err(JoinError::NotSignedIn);
        }

        let memorial = self
            .sync
            .remote()
            .find_by_share_token(&token)
            .await?
            .ok_or_else(|| JoinError::NotFound(token.clone()))?;

        self.view.active.push(memorial.clone());
        let slot = OrderSlot {
            memorial_id: memorial.id,
            relationship: Relationship::Joined,
            sort_index: (self.view.active.len() - 1) as i64,
        };
        self.persist(PersistIntent::TrackJoined { slot });
        tracing::info!(memorial = %memorial.id, token = %token, "joined memorial");
        Ok(memorial)
    }

    // ---------- gated actions ----------

    /// Light a candle; free users spend one of today's free candles first.
    pub fn light_candle(
        &mut self,
        memorial_id: Uuid,
        from_name: Option<&str>,
        message: Option<&str>,
    ) -> Result<Candle, GateError> {
        self.gate(CANDLES)?;
        let candle = Candle::new(memorial_id, from_name, message);
        self.persist(PersistIntent::AddCandle {
            candle: candle.clone(),
        });
        Ok(candle)
    }

    /// Spend one of this month's free AI comfort messages (premium: free).
    pub fn request_comfort_message(&mut self) -> Result<Admission, GateError> {
        self.gate(AI_MESSAGES)
    }

    pub fn remaining_free(&self, feature: &str) -> Result<u32, GateError> {
        Ok(self.quota.remaining(feature)?)
    }

    fn gate(&self, feature: &str) -> Result<Admission, GateError> {
        match self.quota.admit(feature, self.entitlements.is_premium())? {
            Admission::Denied { limit } => Err(GateError::LimitReached {
                feature: feature.to_string(),
                limit,
            }),
            allowed => Ok(allowed),
        }
    }

    // ---------- memories ----------

    /// Newest first, read straight from the remote store.
    pub async fn memories(&self, memorial_id: &Uuid) -> Result<Vec<Memory>, RemoteError> {
        self.sync.remote().fetch_memories(memorial_id).await
    }

    /// Add a written memory. Free users may attach a photo to a limited
    /// number of memories per memorial; the count is read from the store,
    /// so adds still in flight are not included.
    pub async fn add_memory(
        &mut self,
        memorial_id: Uuid,
        title: &str,
        text: &str,
        photo_url: Option<&str>,
    ) -> Result<Memory, GateError> {
        let memory = Memory::new(memorial_id, title, text, photo_url);
        if memory.has_photo() && !self.entitlements.is_premium() {
            let with_photo = self
                .sync
                .remote()
                .fetch_memories(&memorial_id)
                .await?
                .iter()
                .filter(|m| m.has_photo())
                .count();
            let limit = self.free_photos_per_memorial;
            if with_photo >= limit as usize {
                tracing::debug!(memorial = %memorial_id, with_photo, limit, "photo memory refused");
                return Err(GateError::LimitReached {
                    feature: MEMORY_PHOTOS.to_string(),
                    limit,
                });
            }
        }
        self.persist(PersistIntent::AddMemory {
            memory: memory.clone(),
        });
        Ok(memory)
    }

    pub fn delete_memory(&mut self, memorial_id: Uuid, memory_id: Uuid) {
        self.persist(PersistIntent::DeleteMemory {
            memorial_id,
            memory_id,
        });
    }

    // ---------- background results ----------

    /// Fold in whatever background tasks reported. Returns how many events were seen.
    pub fn apply_events(&mut self) -> usize {
        let events = self.queue.drain_events();
        for ev in &events {
            match ev {
                SyncEvent::Reloaded(view) => {
                    tracing::info!(
                        active = view.active.len(),
                        archived = view.archived.len(),
                        "local state replaced by corrective reload"
                    );
                    self.view = view.clone();
                }
                SyncEvent::PersistFailed { kind, error } => {
                    tracing::debug!(intent = *kind, error = %error, "persist failure acknowledged");
                }
                SyncEvent::ReloadFailed { error } => {
                    tracing::debug!(error = %error, "corrective reload failure acknowledged");
                }
            }
        }
        events.len()
    }

    /// Wait for every in-flight write, then apply their results.
    pub async fn settle(&mut self) -> usize {
        self.queue.wait_idle().await;
        self.apply_events()
    }

    fn persist(&mut self, intent: PersistIntent) {
        if self.sync.current_uid().is_none() {
            tracing::debug!(intent = intent.kind(), "not persisted: no signed-in user");
            return;
        }
        self.queue.submit(intent);
    }
}

/// Remove the items at `from` and reinsert them, in their original relative
/// order, as one contiguous block starting at `to` (clamped) in what remains.
/// Out-of-range and duplicate positions are ignored.
pub(crate) fn move_block<T>(items: &mut Vec<T>, from: &[usize], to: usize) {
    let mut picked: Vec<usize> = from.iter().copied().filter(|&i| i < items.len()).collect();
    picked.sort_unstable();
    picked.dedup();
    if picked.is_empty() {
        return;
    }

    let mut moved = Vec::with_capacity(picked.len());
    for &i in picked.iter().rev() {
        moved.push(items.remove(i));
    }
    moved.reverse();

    let at = to.min(items.len());
    items.splice(at..at, moved);
}
