//! Background reconciliation of change-stream events
//!
//! One reconciler task runs per established session. It drains the
//! store's [`ChangeStream`] and folds every delivery into the shared
//! cache, taking the write lock once per delivery.
//!
//! ## Staleness
//!
//! The task captures the session generation at spawn. Teardown bumps the
//! generation before anything else, so a task that lost a race against
//! teardown sees the mismatch under the write lock and exits without
//! touching the cache.
//!
//! ## Conflict Rule
//!
//! Incremental changes apply last-writer-wins on `updated_at`: an inbound
//! item strictly older than the cached entry is discarded, an equal or
//! newer one replaces it. Removals always apply; the store has already
//! performed them.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use larder_cache::{CacheStatus, ItemCache};
use larder_core::ports::{ChangeStream, ItemChange, StoreEvent};

use crate::coordinator::{SessionState, Shared};

/// Drains the change stream until cancellation, staleness, or stream loss
pub(crate) async fn run(
    mut stream: ChangeStream,
    shared: Arc<Shared>,
    generation: u64,
    cancel: CancellationToken,
) {
    debug!(generation, "Reconciler started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(generation, "Reconciler cancelled");
                return;
            }
            event = stream.recv() => {
                let Some(event) = event else {
                    // Channel closed: the subscription is gone and will not resume.
                    handle_stream_loss(&shared, generation).await;
                    return;
                };
                if !apply_event(&shared, generation, event).await {
                    debug!(generation, "Reconciler superseded; exiting");
                    return;
                }
            }
        }
    }
}

/// Applies one delivery; returns false when the session generation moved on
async fn apply_event(shared: &Shared, generation: u64, event: StoreEvent) -> bool {
    let mut cache = shared.cache.write().await;
    if shared.generation.load(Ordering::SeqCst) != generation {
        return false;
    }

    match event {
        StoreEvent::Snapshot(items) => {
            debug!(count = items.len(), "Applying full snapshot");
            cache.replace_all(items);
        }
        StoreEvent::Changes(changes) => {
            for change in changes {
                apply_change(&mut cache, change);
            }
        }
    }
    true
}

/// Folds a single change into the cache under last-writer-wins
fn apply_change(cache: &mut ItemCache, change: ItemChange) {
    match change {
        ItemChange::Added(item) | ItemChange::Modified(item) => {
            if let Some(existing) = cache.get(item.id()) {
                // Ties go to the inbound side; the store stamped it last.
                if existing.updated_at() > item.updated_at() {
                    debug!(id = %item.id(), "Discarding stale inbound change");
                    return;
                }
            }
            cache.upsert(item);
        }
        ItemChange::Removed(id) => {
            debug!(%id, "Evicting item removed at the store");
            cache.remove(&id);
        }
    }
}

/// Marks the session broken after the stream closed underneath it
async fn handle_stream_loss(shared: &Shared, generation: u64) {
    {
        let mut cache = shared.cache.write().await;
        if shared.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        warn!(generation, "Change stream closed; cache contents are now stale");
        cache.set_status(CacheStatus::Error("change stream closed".to_string()));
    }
    *shared.state.write().await = SessionState::Disconnected;
}

// ============================================================================
// Tests
// ============================================================================
