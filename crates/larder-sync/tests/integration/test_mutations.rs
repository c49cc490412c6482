//! Integration tests for optimistic mutations
//!
//! Verifies that add and update reach the store, that the cache reflects
//! the authoritative result, and that every failure path rolls the cache
//! back to its previous contents.

use larder_sync::SyncError;

use crate::common;

#[tokio::test]
async fn test_add_item_persists_and_swaps_provisional_id() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let created = coordinator
        .add_item(common::draft("Milk", 1.0, "gallon"))
        .await
        .expect("add succeeds");

    assert!(!created.id().is_provisional());
    assert_eq!(created.name(), "Milk");

    let active = coordinator.get_active_items().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id(), created.id());

    let doc = store.doc(created.id()).await.expect("document exists");
    assert_eq!(doc.name(), "Milk");
}

#[tokio::test]
async fn test_add_item_carries_draft_fields() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let draft = common::draft("Greek Yogurt", 4.0, "cup")
        .with_category("Dairy")
        .with_notes("for breakfast");
    let created = coordinator.add_item(draft).await.expect("add succeeds");

    assert_eq!(created.category(), Some("Dairy"));
    assert_eq!(created.notes(), Some("for breakfast"));
    let doc = store.doc(created.id()).await.expect("document exists");
    assert_eq!(doc.category(), Some("Dairy"));
}

#[tokio::test]
async fn test_add_item_rejects_invalid_draft() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let err = coordinator
        .add_item(common::draft("   ", 1.0, "unit"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    let err = coordinator
        .add_item(common::draft("Milk", 0.0, "gallon"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(_)));

    assert!(coordinator.get_active_items().await.is_empty());
    assert_eq!(store.doc_count().await, 0);
}

#[tokio::test]
async fn test_add_item_rolls_back_on_store_failure() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.fail_next("create_item", 1).await;

    let err = coordinator
        .add_item(common::draft("Milk", 1.0, "gallon"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailed { .. }));
    // The provisional entry must not survive the failure.
    assert!(coordinator.get_active_items().await.is_empty());
    assert_eq!(store.doc_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_add_item_times_out_and_rolls_back() {
    let (store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.hang_next("create_item", 1).await;

    let err = coordinator
        .add_item(common::draft("Milk", 1.0, "gallon"))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailed { .. }));
    assert!(coordinator.get_active_items().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_entry_visible_while_write_pending() {
    let (store, _sessions, coordinator) = common::fixture();
    let coordinator = std::sync::Arc::new(coordinator);
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.hang_next("create_item", 1).await;

    let worker = std::sync::Arc::clone(&coordinator);
    let handle = tokio::spawn(async move {
        worker
            .add_item(common::draft("Milk", 1.0, "gallon"))
            .await
    });

    // Let the mutation run as far as the hanging store call.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let active = coordinator.get_active_items().await;
    assert_eq!(active.len(), 1);
    assert!(active[0].id().is_provisional());

    // The timeout fires, the write fails, and the provisional entry goes.
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SyncError::PersistenceFailed { .. })));
    assert!(coordinator.get_active_items().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_add_confirm_keeps_newer_inbound_delta_over_echo() {
    let (store, _sessions, coordinator) = common::fixture();
    let coordinator = std::sync::Arc::new(coordinator);
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.delay_next("create_item", 1).await;

    let worker = std::sync::Arc::clone(&coordinator);
    let handle = tokio::spawn(async move {
        worker
            .add_item(common::draft("Milk", 1.0, "gallon"))
            .await
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // The fake mints server ids in sequence; this create gets srv-0001.
    // While its response is pending, another device's newer edit of the
    // same document comes down the stream.
    let inbound = common::stored_item_at(
        "srv-0001",
        "Oat Milk",
        chrono::Utc::now() + chrono::Duration::minutes(5),
    );
    store
        .push_changes(vec![larder_core::ports::ItemChange::Modified(inbound)])
        .await;
    common::eventually(|| async {
        coordinator
            .get_item(&"srv-0001".parse().unwrap())
            .await
            .is_some_and(|item| item.name() == "Oat Milk")
    })
    .await;

    // The create completes; its echo is older than the delta and must
    // not regress the cache.
    let created = handle.await.unwrap().expect("add succeeds");
    assert_eq!(created.id().as_str(), "srv-0001");
    assert_eq!(created.name(), "Milk");

    let active = coordinator.get_active_items().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name(), "Oat Milk");
}

#[tokio::test]
async fn test_update_item_persists_new_state() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let mut edited = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    edited.set_quantity(0.5).unwrap();
    edited.set_notes(Some("half left".to_string()));

    let updated = coordinator.update_item(edited).await.expect("update succeeds");

    assert_eq!(updated.quantity(), 0.5);
    let cached = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    assert_eq!(cached.quantity(), 0.5);
    assert_eq!(cached.notes(), Some("half left"));
    assert_eq!(store.doc(&"a".parse().unwrap()).await.unwrap().quantity(), 0.5);
}

#[tokio::test]
async fn test_update_item_allows_running_out() {
    // Using up the last of something is an edit, not an error.
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Flour")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let mut edited = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    edited.set_quantity(0.0).unwrap();

    coordinator.update_item(edited).await.expect("update succeeds");
    assert_eq!(
        coordinator
            .get_item(&"a".parse().unwrap())
            .await
            .unwrap()
            .quantity(),
        0.0
    );
}

#[tokio::test]
async fn test_update_item_rolls_back_to_previous_on_failure() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.fail_next("update_item", 1).await;

    let mut edited = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    edited.set_quantity(2.0).unwrap();

    let err = coordinator.update_item(edited).await.unwrap_err();

    assert!(matches!(err, SyncError::PersistenceFailed { .. }));
    let cached = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item still cached");
    assert_eq!(cached.quantity(), 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_update_failure_keeps_inbound_delta_over_rollback() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    let coordinator = std::sync::Arc::new(coordinator);
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.hang_next("update_item", 1).await;

    let mut edited = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    edited.set_quantity(2.0).unwrap();

    let worker = std::sync::Arc::clone(&coordinator);
    let handle = tokio::spawn(async move { worker.update_item(edited).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // While the write hangs, another device's newer edit arrives.
    let inbound = common::stored_item_at(
        "a",
        "Oat Milk",
        chrono::Utc::now() + chrono::Duration::minutes(5),
    );
    store
        .push_changes(vec![larder_core::ports::ItemChange::Modified(inbound)])
        .await;
    common::eventually(|| async {
        coordinator
            .get_item(&"a".parse().unwrap())
            .await
            .is_some_and(|item| item.name() == "Oat Milk")
    })
    .await;

    // The write times out, but the rollback must not clobber the delta.
    let result = handle.await.unwrap();
    assert!(matches!(result, Err(SyncError::PersistenceFailed { .. })));
    assert_eq!(
        coordinator
            .get_item(&"a".parse().unwrap())
            .await
            .expect("item cached")
            .name(),
        "Oat Milk"
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_confirm_after_end_session_leaves_cache_empty() {
    let (store, _sessions, coordinator) = common::fixture();
    store.seed(common::stored_item("a", "Milk")).await;
    let coordinator = std::sync::Arc::new(coordinator);
    coordinator.start_session(&common::test_user()).await.expect("session starts");
    store.delay_next("update_item", 1).await;

    let mut edited = coordinator
        .get_item(&"a".parse().unwrap())
        .await
        .expect("item cached");
    edited.set_quantity(2.0).unwrap();

    let worker = std::sync::Arc::clone(&coordinator);
    let handle = tokio::spawn(async move { worker.update_item(edited).await });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    // The session ends while the write is still on the wire.
    coordinator.end_session().await;
    assert!(coordinator.get_active_items().await.is_empty());

    // The write completes against the store, but the cleared cache must
    // not pick the echo back up.
    let result = handle.await.unwrap();
    assert!(result.is_ok());
    assert_eq!(store.doc(&"a".parse().unwrap()).await.unwrap().quantity(), 2.0);
    assert!(coordinator.get_active_items().await.is_empty());
}

#[tokio::test]
async fn test_update_item_rejects_foreign_owner() {
    let (_store, _sessions, coordinator) = common::fixture();
    coordinator.start_session(&common::test_user()).await.expect("session starts");

    let foreign = common::stored_item_for(&common::other_user(), "x", "Their Oats");
    let err = coordinator.update_item(foreign).await.unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert!(coordinator.get_active_items().await.is_empty());
}

#[tokio::test]
async fn test_mutations_require_session() {
    let (_store, _sessions, coordinator) = common::fixture();

    let err = coordinator
        .add_item(common::draft("Milk", 1.0, "gallon"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::AuthenticationRequired));

    let err = coordinator.trash_item(&"a".parse().unwrap()).await.unwrap_err();
    assert!(matches!(err, SyncError::AuthenticationRequired));

    let err = coordinator.trashed_items().await.unwrap_err();
    assert!(matches!(err, SyncError::AuthenticationRequired));
}
