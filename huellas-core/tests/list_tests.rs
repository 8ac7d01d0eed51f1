// huellas-core/tests/list_tests.rs

mod common;

use std::sync::Arc;

use huellas_core::commands::MEMORY_PHOTOS;
use huellas_core::services::quota::CANDLES;
use huellas_core::services::{Entitlements, ManualClock, RemoteStore};
use huellas_core::{GateError, JoinError, Memorial, OrderSlot, PetType, Relationship};

use common::{RecordingRemote, day, free_list, list_for};

const ME: &str = "uid-me";
const FRIEND: &str = "uid-friend";

fn names(ms: &[Memorial]) -> Vec<&str> {
    ms.iter().map(|m| m.name.as_str()).collect()
}

/// A memorial owned by someone else, already stored remotely.
async fn seed_foreign(remote: &RecordingRemote, name: &str, token: Option<&str>) -> Memorial {
    let mut m = Memorial::create_new(name, PetType::Cat, Some(FRIEND));
    if let Some(t) = token {
        m.share_token = t.to_string();
    }
    remote.inner.upsert_memorial(&m).await.unwrap();
    m
}

#[tokio::test]
async fn created_memorials_load_back_in_order() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    list.create_memorial("Luna", PetType::Dog);
    list.create_memorial("Milo", PetType::Cat);
    assert_eq!(list.settle().await, 0);

    let mut fresh = free_list(&remote, ME);
    fresh.load().await.unwrap();
    assert_eq!(names(fresh.active()), vec!["Luna", "Milo"]);
    assert!(fresh.archived().is_empty());
    assert!(fresh.load_error().is_none());
}

#[tokio::test]
async fn reorder_rewrites_every_slot_with_resolved_relationships() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);

    let a = list.create_memorial("A", PetType::Dog);
    let b = seed_foreign(&remote, "B", Some("BBBB0001")).await;
    list.join_by_token("BBBB0001").await.unwrap();
    let c = list.create_memorial("C", PetType::Bird);
    list.settle().await;
    remote.clear_calls();

    list.reorder(&[0], 2);
    assert_eq!(names(list.active()), vec!["B", "C", "A"]);
    list.settle().await;

    let batches = remote.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(
        batches[0],
        vec![
            OrderSlot { memorial_id: b.id, relationship: Relationship::Joined, sort_index: 0 },
            OrderSlot { memorial_id: c.id, relationship: Relationship::Owned, sort_index: 1 },
            OrderSlot { memorial_id: a.id, relationship: Relationship::Owned, sort_index: 2 },
        ]
    );

    let mut fresh = free_list(&remote, ME);
    fresh.load().await.unwrap();
    assert_eq!(names(fresh.active()), vec!["B", "C", "A"]);
}

#[tokio::test]
async fn reorder_in_place_still_publishes_full_order() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.settle().await;
    remote.clear_calls();

    list.reorder(&[1], 1);
    list.settle().await;

    assert_eq!(names(list.active()), vec!["A", "B"]);
    let batches = remote.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[0].iter().map(|s| s.sort_index).collect::<Vec<_>>(), vec![0, 1]);
}

#[tokio::test]
async fn reorder_keeps_archived_entries_archived() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    list.create_memorial("A", PetType::Dog);
    let b = list.create_memorial("B", PetType::Dog);
    list.create_memorial("C", PetType::Dog);
    list.settle().await;

    assert!(list.archive(&b.id));
    list.settle().await;
    list.reorder(&[1], 0);
    list.settle().await;

    let mut fresh = free_list(&remote, ME);
    fresh.load().await.unwrap();
    assert_eq!(names(fresh.active()), vec!["C", "A"]);
    assert_eq!(names(fresh.archived()), vec!["B"]);
}

#[tokio::test]
async fn archive_then_restore_returns_to_active() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    let a = list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.settle().await;

    assert!(list.archive(&a.id));
    assert_eq!(names(list.active()), vec!["B"]);
    assert_eq!(names(list.archived()), vec!["A"]);
    assert!(!list.archive(&a.id));

    assert!(list.restore(&a.id));
    assert_eq!(names(list.active()), vec!["B", "A"]);
    assert!(list.archived().is_empty());
    assert_eq!(list.settle().await, 0);

    let mut fresh = free_list(&remote, ME);
    fresh.load().await.unwrap();
    assert!(fresh.active().iter().any(|m| m.id == a.id));
    assert!(fresh.archived().is_empty());
}

#[tokio::test]
async fn failed_archive_is_corrected_by_a_reload() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    let a = list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.settle().await;

    remote.fail("set_archived");
    assert!(list.archive(&a.id));
    assert_eq!(names(list.archived()), vec!["A"]);

    let events = list.settle().await;
    assert_eq!(events, 2);
    assert_eq!(names(list.active()), vec!["A", "B"]);
    assert!(list.archived().is_empty());
}

#[tokio::test]
async fn failed_restore_is_corrected_by_a_reload() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    let a = list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.settle().await;
    assert!(list.archive(&a.id));
    list.settle().await;

    remote.fail("set_archived");
    assert!(list.restore(&a.id));
    assert!(list.archived().is_empty());

    assert_eq!(list.settle().await, 2);
    assert_eq!(names(list.active()), vec!["B"]);
    assert_eq!(names(list.archived()), vec!["A"]);
}

#[tokio::test]
async fn failed_create_keeps_the_local_item_without_reloading() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    remote.fail("upsert_memorial");

    let a = list.create_memorial("A", PetType::Dog);
    assert_eq!(list.settle().await, 1);

    assert_eq!(names(list.active()), vec!["A"]);
    assert!(list.find(&a.id).is_some());
    assert_eq!(remote.count("fetch_order"), 0);
}

#[tokio::test]
async fn failed_reorder_keeps_local_order() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.settle().await;
    remote.clear_calls();

    remote.fail("write_order_batch");
    list.reorder(&[0], 1);
    assert_eq!(list.settle().await, 1);

    assert_eq!(names(list.active()), vec!["B", "A"]);
    assert_eq!(remote.count("fetch_order"), 0);
}

#[tokio::test]
async fn joining_twice_tracks_once() {
    let remote = RecordingRemote::new();
    let m = seed_foreign(&remote, "Kira", None).await;
    let mut list = free_list(&remote, ME);

    let first = list.join_by_token(&m.share_token).await.unwrap();
    let second = list.join_by_token(&m.share_token.to_lowercase()).await.unwrap();
    list.settle().await;

    assert_eq!(first.id, m.id);
    assert_eq!(second.id, m.id);
    assert_eq!(list.active().len(), 1);
    assert_eq!(remote.count("find_by_share_token"), 1);
    assert_eq!(remote.count("upsert_order_slot"), 1);

    let order = remote.fetch_order(ME).await.unwrap();
    assert_eq!(order.len(), 1);
    assert_eq!(order[0].relationship, Relationship::Joined);
}

#[tokio::test]
async fn link_and_bare_token_forms_look_up_the_same_token() {
    let remote = RecordingRemote::new();
    let m = seed_foreign(&remote, "Kira", Some("AB12CD34")).await;

    for input in ["https://huellas.app/m/ab12cd34", "ab12cd34", "  AB12CD34  "] {
        let mut list = free_list(&remote, ME);
        remote.clear_calls();
        let joined = list.join_by_token(input).await.unwrap();
        assert_eq!(joined.id, m.id, "input {input:?}");
        assert_eq!(remote.calls()[0], "find_by_share_token:AB12CD34");
        list.settle().await;
    }
}

#[tokio::test]
async fn joining_an_archived_memorial_restores_it() {
    let remote = RecordingRemote::new();
    let m = seed_foreign(&remote, "Kira", None).await;
    let mut list = free_list(&remote, ME);
    list.join_by_token(&m.share_token).await.unwrap();
    list.settle().await;
    list.archive(&m.id);
    list.settle().await;
    remote.clear_calls();

    let again = list.join_by_token(&m.share_token).await.unwrap();
    assert_eq!(again.id, m.id);
    assert_eq!(names(list.active()), vec!["Kira"]);
    assert!(list.archived().is_empty());
    list.settle().await;
    assert_eq!(remote.count("find_by_share_token"), 0);
    assert_eq!(remote.count("set_archived"), 1);
}

#[tokio::test]
async fn blank_token_is_rejected_without_remote_calls() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);

    assert!(matches!(list.join_by_token("").await, Err(JoinError::InvalidInput)));
    assert!(matches!(list.join_by_token("   ").await, Err(JoinError::InvalidInput)));
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn joining_needs_a_signed_in_user() {
    let remote = RecordingRemote::new();
    seed_foreign(&remote, "Luna", Some("AB12CD34")).await;
    let clock = Arc::new(ManualClock::new(day(2025, 12, 10)));
    let mut list = list_for(&remote, None, clock, Entitlements::free());

    let err = list.join_by_token("https://huellas.app/m/AB12CD34").await.unwrap_err();
    assert!(matches!(err, JoinError::NotSignedIn));
    assert!(list.active().is_empty());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);

    let err = list.join_by_token("FFFF0000").await.unwrap_err();
    assert!(matches!(err, JoinError::NotFound(t) if t == "FFFF0000"));
    assert!(list.active().is_empty());
    list.settle().await;
    assert_eq!(remote.count("upsert_order_slot"), 0);
}

#[tokio::test]
async fn empty_order_set_falls_back_to_visible_memorials() {
    let remote = RecordingRemote::new();
    let mine = Memorial::create_new("Old Rex", PetType::Dog, Some(ME));
    let legacy = Memorial::create_new("Older Tom", PetType::Cat, None);
    remote.inner.upsert_memorial(&mine).await.unwrap();
    remote.inner.upsert_memorial(&legacy).await.unwrap();
    seed_foreign(&remote, "Not mine", None).await;

    let mut list = free_list(&remote, ME);
    list.load().await.unwrap();

    let mut loaded = names(list.active());
    loaded.sort_unstable();
    assert_eq!(loaded, vec!["Old Rex", "Older Tom"]);
    assert!(list.archived().is_empty());
    assert_eq!(remote.count("write_order_batch"), 0);
    assert_eq!(remote.count("upsert_order_slot"), 0);
}

#[tokio::test]
async fn order_entries_without_a_memorial_are_dropped() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    list.create_memorial("A", PetType::Dog);
    list.settle().await;

    let ghost = OrderSlot {
        memorial_id: uuid::Uuid::new_v4(),
        relationship: Relationship::Joined,
        sort_index: 0,
    };
    remote.inner.upsert_order_slot(ME, &ghost).await.unwrap();

    let mut fresh = free_list(&remote, ME);
    fresh.load().await.unwrap();
    assert_eq!(names(fresh.active()), vec!["A"]);
}

#[tokio::test]
async fn load_failure_sets_a_user_message() {
    let remote = RecordingRemote::new();
    remote.fail("fetch_order");
    let mut list = free_list(&remote, ME);

    assert!(list.load().await.is_err());
    assert!(list.load_error().is_some());

    remote.heal();
    list.load().await.unwrap();
    assert!(list.load_error().is_none());
}

#[tokio::test]
async fn signed_out_user_mutates_locally_only() {
    let remote = RecordingRemote::new();
    let clock = Arc::new(ManualClock::new(day(2025, 12, 10)));
    let mut list = list_for(&remote, None, clock, Entitlements::free());

    list.load().await.unwrap();
    let a = list.create_memorial("A", PetType::Dog);
    list.create_memorial("B", PetType::Dog);
    list.reorder(&[0], 1);
    list.archive(&a.id);
    assert_eq!(list.settle().await, 0);

    assert_eq!(names(list.active()), vec!["B"]);
    assert!(a.owner_uid.is_none());
    assert!(remote.calls().is_empty());
}

#[tokio::test]
async fn free_candles_run_out_until_tomorrow() {
    let remote = RecordingRemote::new();
    let clock = Arc::new(ManualClock::new(day(2025, 12, 10)));
    let mut list = list_for(&remote, Some(ME), clock.clone(), Entitlements::free());
    let m = list.create_memorial("Luna", PetType::Dog);

    list.light_candle(m.id, Some("  Ana "), Some("te extrañamos")).unwrap();
    list.light_candle(m.id, None, Some("   ")).unwrap();
    let err = list.light_candle(m.id, None, None).unwrap_err();
    assert!(matches!(err, GateError::LimitReached { limit: 2, .. }));
    assert_eq!(list.remaining_free(CANDLES).unwrap(), 0);

    clock.advance_days(1);
    list.light_candle(m.id, None, None).unwrap();
    list.settle().await;

    let candles = remote.fetch_candles(&m.id).await.unwrap();
    assert_eq!(candles.len(), 3);
    assert!(candles.iter().any(|c| c.from_name.as_deref() == Some("Ana")));
    assert!(candles.iter().all(|c| c.message.as_deref() != Some("   ")));
}

#[tokio::test]
async fn premium_users_skip_the_candle_counter() {
    let remote = RecordingRemote::new();
    let clock = Arc::new(ManualClock::new(day(2025, 12, 10)));
    let entitlements = Entitlements::free();
    let mut list = list_for(&remote, Some(ME), clock, entitlements.clone());
    let m = list.create_memorial("Luna", PetType::Dog);

    entitlements.set_premium(true);
    for _ in 0..5 {
        list.light_candle(m.id, None, None).unwrap();
    }
    assert_eq!(list.remaining_free(CANDLES).unwrap(), 2);

    entitlements.set_premium(false);
    list.request_comfort_message().unwrap();
    list.request_comfort_message().unwrap();
    list.request_comfort_message().unwrap();
    assert!(matches!(
        list.request_comfort_message(),
        Err(GateError::LimitReached { limit: 3, .. })
    ));
    list.settle().await;
}

#[tokio::test]
async fn free_users_attach_a_limited_number_of_photos() {
    let remote = RecordingRemote::new();
    let clock = Arc::new(ManualClock::new(day(2025, 12, 10)));
    let entitlements = Entitlements::free();
    let mut list = list_for(&remote, Some(ME), clock, entitlements.clone());
    let m = list.create_memorial("Luna", PetType::Dog);
    list.settle().await;

    for i in 0..3 {
        let url = format!("https://img.example/luna-{i}.jpg");
        list.add_memory(m.id, "Playa", "Corriendo", Some(&url)).await.unwrap();
        list.settle().await;
    }
    let err = list
        .add_memory(m.id, "Otra", "", Some("https://img.example/luna-4.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::LimitReached { ref feature, limit: 3 } if feature == MEMORY_PHOTOS));

    // Text-only memories and a blank photo link are never gated.
    list.add_memory(m.id, "Sin foto", "Dormida al sol", None).await.unwrap();
    list.add_memory(m.id, "Tampoco", "", Some("   ")).await.unwrap();

    entitlements.set_premium(true);
    list.add_memory(m.id, "Premium", "", Some("https://img.example/luna-5.jpg")).await.unwrap();
    list.settle().await;

    let memories = list.memories(&m.id).await.unwrap();
    assert_eq!(memories.len(), 6);
    assert_eq!(memories.iter().filter(|m| m.has_photo()).count(), 4);
}

#[tokio::test]
async fn deleted_memory_disappears() {
    let remote = RecordingRemote::new();
    let mut list = free_list(&remote, ME);
    let m = list.create_memorial("Luna", PetType::Dog);
    let memory = list.add_memory(m.id, "Playa", "Corriendo", None).await.unwrap();
    list.settle().await;
    assert_eq!(list.memories(&m.id).await.unwrap().len(), 1);

    list.delete_memory(m.id, memory.id);
    list.settle().await;
    assert!(list.memories(&m.id).await.unwrap().is_empty());
    assert_eq!(remote.count("delete_memory"), 1);
}
