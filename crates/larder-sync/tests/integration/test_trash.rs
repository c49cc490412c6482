//! Integration tests for the trash lifecycle
//!
//! Verifies trash, restore, permanent delete, and empty-trash end to end,
//! including idempotent no-ops and rollback behavior.

use chrono::Utc;
use larder_sync::SyncError;

use crate::common;

#[tokio::test]
async fn test_trash_item_moves_out_of_active_set() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    coordinator
        .trash_item(&"a".parse().unwrap())
        .await
        .expect("trash succeeds");

    assert!(coordinator.get_active_items().await.is_empty());

    let doc = store.doc(&"a".parse().unwrap()).await.expect("doc kept");
    assert!(doc.in_trash());
    assert!(doc.trashed_at().is_some());

    let trash = coordinator.trashed_items().await.expect("trash query");
    assert_eq!(trash.len(), 1);
    assert_eq!(trash[0].name(), "Milk");
}

#[tokio::test]
async fn test_trash_item_rolls_back_on_failure() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.fail_next("update_item", 1).await;

    let err = coordinator.trash_item(&"a".parse().unwrap()).await.unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailed { .. }));
    // Back in the active set, still active at the store.
    assert_eq!(coordinator.get_active_items().await.len(), 1);
    assert!(!store.doc(&"a".parse().unwrap()).await.unwrap().in_trash());
}

#[tokio::test]
async fn test_trash_missing_item_is_noop() {
    let (_store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    coordinator
        .trash_item(&"ghost".parse().unwrap())
        .await
        .expect("no-op");
}

#[tokio::test]
async fn test_restore_item_returns_to_active_set() {
    let (store, _sessions, coordinator) = common::fixture();
    let mut trashed = common::stored_item("a", "Milk");
    trashed.trash(Utc::now()).unwrap();
    store.seed(trashed).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    assert!(coordinator.get_active_items().await.is_empty());

    let restored = coordinator
        .restore_item(&"a".parse().unwrap())
        .await
        .expect("restore succeeds");

    assert!(!restored.in_trash());
    assert!(restored.trashed_at().is_none());
    assert_eq!(coordinator.get_active_items().await.len(), 1);
    assert!(!store.doc(&"a".parse().unwrap()).await.unwrap().in_trash());
    assert!(coordinator.trashed_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_already_active_is_noop() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let restored = coordinator
        .restore_item(&"a".parse().unwrap())
        .await
        .expect("no-op restore");

    assert_eq!(restored.name(), "Milk");
    assert_eq!(coordinator.get_active_items().await.len(), 1);
}

#[tokio::test]
async fn test_restore_missing_item_fails() {
    let (_store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let err = coordinator
        .restore_item(&"ghost".parse().unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::ItemNotFound(_)));
}

#[tokio::test]
async fn test_delete_item_removes_document() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    coordinator
        .delete_item(&"a".parse().unwrap())
        .await
        .expect("delete succeeds");

    assert!(coordinator.get_active_items().await.is_empty());
    assert!(store.doc(&"a".parse().unwrap()).await.is_none());
}

#[tokio::test]
async fn test_delete_trashed_item_from_trash_view() {
    let (store, _sessions, coordinator) = common::fixture();
    let mut trashed = common::stored_item("a", "Stale Bread");
    trashed.trash(Utc::now()).unwrap();
    store.seed(trashed).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    coordinator
        .delete_item(&"a".parse().unwrap())
        .await
        .expect("delete succeeds");

    assert_eq!(store.doc_count().await, 0);
    assert!(coordinator.trashed_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_failure_leaves_item_evicted() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.fail_next("delete_item", 1).await;

    let err = coordinator.delete_item(&"a".parse().unwrap()).await.unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailed { .. }));
    // The document's fate is unknown, so the entry is not re-inserted;
    // the change stream is the authority from here.
    assert!(coordinator.get_active_items().await.is_empty());
    assert!(store.doc(&"a".parse().unwrap()).await.is_some());
}

#[tokio::test]
async fn test_empty_trash_deletes_all_trashed() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    let mut old_bread = common::stored_item("b", "Stale Bread");
    old_bread.trash(Utc::now()).unwrap();
    store.seed(old_bread).await;
    let mut old_rice = common::stored_item("c", "Mystery Rice");
    old_rice.trash(Utc::now()).unwrap();
    store.seed(old_rice).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let deleted = coordinator.empty_trash().await.expect("empty trash");

    assert_eq!(deleted, 2);
    assert!(coordinator.trashed_items().await.unwrap().is_empty());
    // The active item is untouched.
    assert_eq!(coordinator.get_active_items().await.len(), 1);
    assert_eq!(store.doc_count().await, 1);
}

#[tokio::test]
async fn test_empty_trash_with_nothing_trashed() {
    let (_store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let deleted = coordinator.empty_trash().await.expect("empty trash");
    assert_eq!(deleted, 0);
}

#[tokio::test]
async fn test_add_trash_restore_round_trip() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let created = coordinator
        .add_item(common::draft("Milk", 1.0, "gallon"))
        .await
        .expect("add succeeds");
    assert_eq!(coordinator.get_active_items().await.len(), 1);

    coordinator
        .trash_item(created.id())
        .await
        .expect("trash succeeds");
    assert!(coordinator.get_active_items().await.is_empty());

    let restored = coordinator
        .restore_item(created.id())
        .await
        .expect("restore succeeds");

    assert_eq!(restored.name(), "Milk");
    assert_eq!(restored.quantity(), 1.0);
    let active = coordinator.get_active_items().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id(), created.id());
    assert_eq!(store.doc_count().await, 1);
}
