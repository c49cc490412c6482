//! Session-scoped synchronization coordinator
//!
//! The [`SyncCoordinator`] owns the lifecycle that keeps the in-memory
//! [`ItemCache`] reconciled with the remote store for exactly one
//! signed-in user at a time.
//!
//! ## Session Flow
//!
//! 1. **Resolve the user**: ask the session provider who is signed in
//! 2. **Tear down**: stop any previous reconciler, wipe the cache
//! 3. **Prime**: one-shot query of the active set, swapped into the cache
//! 4. **Subscribe**: open the change stream
//! 5. **Reconcile**: spawn the background task applying stream events
//!
//! ## Writer Discipline
//!
//! The cache lives behind one `RwLock`. Only two writers exist: mutation
//! methods here (optimistic apply plus rollback) and the reconciler task
//! (stream events). Each takes the write lock for one event at a time, so
//! readers never observe a half-applied change.
//!
//! ## Retry Logic
//!
//! Priming and subscribing retry transient failures with exponential
//! backoff (default 3 attempts: 500ms, 1s). Mutations are never retried;
//! they roll back their optimistic cache change and surface the failure.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use larder_cache::{CacheQuery, CacheStatus, ItemCache};
use larder_core::config::Config;
use larder_core::domain::{DomainError, ItemDraft, ItemId, PantryItem, UserId};
use larder_core::ports::{IRemoteStore, ISessionProvider, ItemFilter};

use crate::reconciler;
use crate::SyncError;

// ============================================================================
// SessionState enum
// ============================================================================

/// Connection state of the coordinator's pipeline to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session; reads serve whatever the cache last held
    Disconnected,
    /// Session starting: priming query and subscription in progress
    Subscribing,
    /// Change stream live; the cache is continuously reconciled
    Subscribed,
}

impl SessionState {
    /// Returns true while the change stream is live
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SessionState::Subscribed)
    }

    /// Returns the state name as a string
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Subscribing => "Subscribing",
            SessionState::Subscribed => "Subscribed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Retry logic
// ============================================================================

/// Determines whether an error is worth retrying
///
/// Transport-level failures (network, timeouts, rate limiting, server
/// errors) are transient. Authorization failures are not; retrying them
/// cannot succeed until the user signs in again.
fn is_transient_error(err: &anyhow::Error) -> bool {
    let err_str = format!("{err:#}").to_lowercase();

    if err_str.contains("permission")
        || err_str.contains("unauthorized")
        || err_str.contains("unauthenticated")
    {
        return false;
    }

    // Network and transport errors
    if err_str.contains("network")
        || err_str.contains("connection")
        || err_str.contains("timeout")
        || err_str.contains("timed out")
        || err_str.contains("unavailable")
        || err_str.contains("dns")
        || err_str.contains("reset by peer")
        || err_str.contains("broken pipe")
    {
        return true;
    }

    // Rate limiting
    if err_str.contains("429")
        || err_str.contains("too many requests")
        || err_str.contains("rate limit")
    {
        return true;
    }

    // Server errors (5xx)
    err_str.contains("500")
        || err_str.contains("502")
        || err_str.contains("503")
        || err_str.contains("504")
        || err_str.contains("server error")
}

/// Executes an async operation with bounded exponential backoff
///
/// Makes at most `attempts` calls. Only transient errors are retried;
/// anything else is returned immediately.
///
/// Backoff schedule with the defaults (3 attempts, 500ms base): 500ms, 1s.
async fn with_retry<F, Fut, T>(
    operation: &str,
    attempts: u32,
    base_delay_ms: u64,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<anyhow::Error> = None;

    for attempt in 0..attempts {
        match f().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt + 1 < attempts && is_transient_error(&err) {
                    let delay_ms = base_delay_ms * 2u64.pow(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms,
                        error = %err,
                        "Transient error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    last_error = Some(err);
                } else {
                    return Err(err);
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Retry budget exhausted for {operation}")))
}

// ============================================================================
// Shared state
// ============================================================================

/// State shared between the coordinator and its reconciler task
pub(crate) struct Shared {
    /// The single cache instance behind the writer-discipline lock
    pub(crate) cache: RwLock<ItemCache>,
    /// Observable pipeline state
    pub(crate) state: RwLock<SessionState>,
    /// Session generation, bumped on every teardown; a task holding an
    /// older generation must not touch the cache
    pub(crate) generation: AtomicU64,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            cache: RwLock::new(ItemCache::new()),
            state: RwLock::new(SessionState::Disconnected),
            generation: AtomicU64::new(0),
        }
    }
}

// ============================================================================
// SyncCoordinator struct
// ============================================================================

/// Runtime pieces of the active session
struct SessionRuntime {
    /// The signed-in user this session is bound to
    user: Option<UserId>,
    /// Cancels the reconciler task on teardown
    cancel: Option<CancellationToken>,
    /// Handle to the reconciler task, awaited on teardown
    reconciler: Option<JoinHandle<()>>,
}

/// Session-scoped synchronization between the remote store and the cache
///
/// ## Dependencies
///
/// - `store`: Remote document operations (query, write, subscribe)
/// - `sessions`: Source of the currently signed-in user
/// - `config`: Retry, timeout, and expiry-window settings
pub struct SyncCoordinator {
    /// Remote pantry-item document store
    store: Arc<dyn IRemoteStore>,
    /// Source of the signed-in user
    sessions: Arc<dyn ISessionProvider>,
    /// Retry, timeout, and expiry-window settings
    config: Config,
    /// State shared with the reconciler task
    shared: Arc<Shared>,
    /// Active session runtime; the lock serializes start/end
    runtime: Mutex<SessionRuntime>,
}

impl SyncCoordinator {
    /// Creates a new `SyncCoordinator` with the given dependencies
    ///
    /// The coordinator starts `Disconnected` with an empty cache; call
    /// [`start_session`](Self::start_session) once a user is signed in.
    pub fn new(
        store: Arc<dyn IRemoteStore>,
        sessions: Arc<dyn ISessionProvider>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            sessions,
            config: config.clone(),
            shared: Arc::new(Shared::new()),
            runtime: Mutex::new(SessionRuntime {
                user: None,
                cancel: None,
                reconciler: None,
            }),
        }
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Starts (or restarts) the sync session for `user`
    ///
    /// Verifies the upstream session belongs to that user, tears down any
    /// previous session, primes the cache with a one-shot query, then
    /// opens the change stream and spawns the reconciler. On failure the
    /// cache is flagged `Error` and the coordinator stays `Disconnected`.
    ///
    /// # Errors
    /// - [`SyncError::AuthenticationRequired`] if nobody is signed in or
    ///   somebody other than `user` is
    /// - [`SyncError::SyncUnavailable`] if priming or subscribing fails
    ///   after the configured retries
    #[tracing::instrument(skip(self))]
    pub async fn start_session(&self, user: &UserId) -> Result<(), SyncError> {
        let mut runtime = self.runtime.lock().await;

        // Step 1: Verify the upstream session covers the requested user
        match self.sessions.current_user().await {
            Ok(Some(current)) if current == *user => {}
            Ok(_) => {
                self.sign_out(&mut runtime).await;
                return Err(SyncError::AuthenticationRequired);
            }
            Err(err) => {
                warn!(error = %err, "Session provider failed; treating as signed out");
                self.sign_out(&mut runtime).await;
                return Err(SyncError::AuthenticationRequired);
            }
        }

        info!(user = %user, "Starting sync session");

        // Step 2: Tear down whatever was running before
        self.teardown(&mut runtime).await;

        // Step 3: Bind and prime the cache
        *self.shared.state.write().await = SessionState::Subscribing;
        {
            let mut cache = self.shared.cache.write().await;
            cache.clear();
            cache.bind_owner(user.clone());
            cache.set_status(CacheStatus::Loading);
        }

        let sync_cfg = &self.config.sync;
        let filter = ItemFilter::active(user.clone());

        let items = match with_retry(
            "query_items",
            sync_cfg.subscribe_attempts,
            sync_cfg.backoff_base_ms,
            || {
                let filter = filter.clone();
                async move { self.store.query_items(&filter).await }
            },
        )
        .await
        {
            Ok(items) => items,
            Err(err) => return Err(self.fail_session("Initial query failed", err).await),
        };

        debug!(count = items.len(), "Priming cache from initial query");
        self.shared.cache.write().await.replace_all(items);

        // Step 4: Open the change stream
        let stream = match with_retry(
            "subscribe",
            sync_cfg.subscribe_attempts,
            sync_cfg.backoff_base_ms,
            || {
                let filter = filter.clone();
                async move { self.store.subscribe(&filter).await }
            },
        )
        .await
        {
            Ok(stream) => stream,
            Err(err) => return Err(self.fail_session("Subscription failed", err).await),
        };

        // Step 5: Spawn the reconciler for this generation
        let cancel = CancellationToken::new();
        let generation = self.shared.generation.load(Ordering::SeqCst);
        let handle = tokio::spawn(reconciler::run(
            stream,
            Arc::clone(&self.shared),
            generation,
            cancel.clone(),
        ));

        *self.shared.state.write().await = SessionState::Subscribed;
        runtime.user = Some(user.clone());
        runtime.cancel = Some(cancel);
        runtime.reconciler = Some(handle);

        info!(generation, "Sync session established");
        Ok(())
    }

    /// Ends the active session and clears the cache
    ///
    /// Idempotent; ending when nothing is running is a no-op.
    #[tracing::instrument(skip(self))]
    pub async fn end_session(&self) {
        let mut runtime = self.runtime.lock().await;
        self.sign_out(&mut runtime).await;
        info!("Sync session ended");
    }

    /// Teardown plus a wiped cache and a `Disconnected` state
    async fn sign_out(&self, runtime: &mut SessionRuntime) {
        self.teardown(runtime).await;
        self.shared.cache.write().await.clear();
        *self.shared.state.write().await = SessionState::Disconnected;
    }

    /// Stops the reconciler and invalidates its generation
    ///
    /// After this returns no task from a previous session can touch the
    /// cache: the generation has moved on and the task has been awaited
    /// to completion.
    async fn teardown(&self, runtime: &mut SessionRuntime) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        if let Some(cancel) = runtime.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = runtime.reconciler.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Reconciler task failed during teardown");
            }
        }
        runtime.user = None;
    }

    /// Marks the session failed: cache flagged stale, state `Disconnected`
    async fn fail_session(&self, what: &str, err: anyhow::Error) -> SyncError {
        let reason = format!("{what}: {err:#}");
        error!(%reason, "Session start failed");

        self.shared
            .cache
            .write()
            .await
            .set_status(CacheStatus::Error(reason.clone()));
        *self.shared.state.write().await = SessionState::Disconnected;

        SyncError::SyncUnavailable { reason }
    }

    /// Returns the session's bound user, or fails when nobody is signed in
    async fn bound_user(&self) -> Result<UserId, SyncError> {
        let runtime = self.runtime.lock().await;
        runtime
            .user
            .clone()
            .ok_or(SyncError::AuthenticationRequired)
    }

    /// Runs a store write under the configured mutation timeout
    async fn persist<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T, SyncError> {
        let timeout = Duration::from_secs(self.config.sync.mutation_timeout_secs);
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, error = %err, "Store write failed");
                Err(SyncError::PersistenceFailed { source: err })
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_secs = timeout.as_secs(),
                    "Store write timed out"
                );
                Err(SyncError::PersistenceFailed {
                    source: anyhow::anyhow!(
                        "{operation} timed out after {}s",
                        timeout.as_secs()
                    ),
                })
            }
        }
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Adds a new item for the signed-in user
    ///
    /// The item appears in the cache immediately under a provisional id;
    /// once the store acknowledges, the provisional entry is replaced by
    /// the authoritative one. On failure the provisional entry is rolled
    /// back and the error surfaced.
    ///
    /// # Errors
    /// - [`SyncError::Validation`] if the draft fails domain rules
    /// - [`SyncError::AuthenticationRequired`] without an active session
    /// - [`SyncError::PersistenceFailed`] if the store write fails or
    ///   times out
    #[tracing::instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn add_item(&self, draft: ItemDraft) -> Result<PantryItem, SyncError> {
        let user = self.bound_user().await?;

        let provisional_id = ItemId::provisional();
        let item = PantryItem::from_draft(draft, provisional_id.clone(), user, Utc::now())?;

        // Optimistic: visible before the store acknowledges
        self.shared.cache.write().await.upsert(item.clone());
        debug!(id = %provisional_id, "Optimistically inserted provisional item");

        match self
            .persist("create_item", self.store.create_item(&item))
            .await
        {
            Ok(created) => {
                let mut cache = self.shared.cache.write().await;
                cache.remove(&provisional_id);
                // With the provisional entry gone, anything under the
                // server id came through the change stream; keep it when
                // it is newer than the create echo.
                let superseded = cache
                    .get(created.id())
                    .is_some_and(|current| current.updated_at() > created.updated_at());
                if !superseded {
                    cache.upsert(created.clone());
                }
                drop(cache);
                info!(id = %created.id(), "Item created");
                Ok(created)
            }
            Err(err) => {
                self.shared.cache.write().await.remove(&provisional_id);
                Err(err)
            }
        }
    }

    /// Replaces an item's document with the given state
    ///
    /// Whole-document write. The caller mutates a copy of the cached item
    /// through its setters and hands it back; `updated_at` is re-stamped
    /// here so the edit wins last-writer-wins against older deltas.
    ///
    /// # Errors
    /// - [`SyncError::Validation`] if the item belongs to another user
    /// - [`SyncError::AuthenticationRequired`] without an active session
    /// - [`SyncError::PersistenceFailed`] if the store write fails; the
    ///   cache is rolled back to the previous entry
    #[tracing::instrument(skip(self, item), fields(id = %item.id()))]
    pub async fn update_item(&self, mut item: PantryItem) -> Result<PantryItem, SyncError> {
        let user = self.bound_user().await?;
        if item.owner_id() != &user {
            return Err(SyncError::Validation(DomainError::OwnerMismatch));
        }

        item.set_updated_at(Utc::now());

        // Optimistic: capture the previous entry, swap in the new one
        let previous = {
            let mut cache = self.shared.cache.write().await;
            let previous = cache.get(item.id()).cloned();
            cache.upsert(item.clone());
            previous
        };

        match self
            .persist("update_item", self.store.update_item(&item))
            .await
        {
            Ok(updated) => {
                let mut cache = self.shared.cache.write().await;
                // An inbound delta newer than the store's response stays;
                // our own optimistic guess never counts as newer.
                let superseded = cache.get(updated.id()).is_some_and(|current| {
                    current != &item && current.updated_at() > updated.updated_at()
                });
                if !superseded {
                    cache.upsert(updated.clone());
                }
                drop(cache);
                debug!(id = %updated.id(), "Item updated");
                Ok(updated)
            }
            Err(err) => {
                let mut cache = self.shared.cache.write().await;
                // Compare-and-restore: roll back only while the cache still
                // holds our optimistic guess; an inbound authoritative delta
                // that landed in the meantime stays.
                let still_ours = cache.get(item.id()).is_some_and(|current| current == &item);
                if still_ours {
                    match previous {
                        Some(prev) => cache.upsert(prev),
                        None => {
                            cache.remove(item.id());
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Moves an item to the trash
    ///
    /// The item leaves the active set immediately; on store failure it is
    /// re-inserted. Trashing an item that is not in the active set is a
    /// no-op, which makes a retried tap safe.
    #[tracing::instrument(skip(self))]
    pub async fn trash_item(&self, id: &ItemId) -> Result<(), SyncError> {
        self.bound_user().await?;

        let (previous, trashed) = {
            let mut cache = self.shared.cache.write().await;
            let Some(previous) = cache.get(id).cloned() else {
                debug!(%id, "Trash requested for an item not in the active set; no-op");
                return Ok(());
            };
            let mut trashed = previous.clone();
            trashed.trash(Utc::now())?;
            cache.remove(id);
            (previous, trashed)
        };

        match self
            .persist("trash_item", self.store.update_item(&trashed))
            .await
        {
            Ok(_) => {
                info!(%id, "Item moved to trash");
                Ok(())
            }
            Err(err) => {
                self.shared.cache.write().await.upsert(previous);
                Err(err)
            }
        }
    }

    /// Restores a trashed item back to the active set
    ///
    /// Unlike the other mutations this one is not optimistic: the trashed
    /// document lives only in the store, so the restore is persisted
    /// first and the cache updated from the store's response. Restoring
    /// an item that is already active is a no-op.
    ///
    /// # Errors
    /// - [`SyncError::ItemNotFound`] if no such document exists
    /// - [`SyncError::SyncUnavailable`] if the pre-restore fetch fails
    /// - [`SyncError::PersistenceFailed`] if the store write fails
    #[tracing::instrument(skip(self))]
    pub async fn restore_item(&self, id: &ItemId) -> Result<PantryItem, SyncError> {
        let user = self.bound_user().await?;

        let fetched = self
            .store
            .fetch_item(&user, id)
            .await
            .map_err(|err| SyncError::SyncUnavailable {
                reason: format!("Fetch before restore failed: {err:#}"),
            })?;

        let Some(stored) = fetched else {
            return Err(SyncError::ItemNotFound(id.clone()));
        };

        if !stored.in_trash() {
            debug!(%id, "Restore requested for an already-active item; no-op");
            self.shared.cache.write().await.upsert(stored.clone());
            return Ok(stored);
        }

        let mut restored = stored;
        restored.restore(Utc::now())?;

        let updated = self
            .persist("restore_item", self.store.update_item(&restored))
            .await?;
        self.shared.cache.write().await.upsert(updated.clone());
        info!(%id, "Item restored from trash");
        Ok(updated)
    }

    /// Permanently deletes an item
    ///
    /// Works on both active and trashed items. The active cache entry (if
    /// any) is evicted up front and not restored on failure: the document's
    /// fate at the store is unknown at that point and the change stream
    /// will deliver the truth.
    #[tracing::instrument(skip(self))]
    pub async fn delete_item(&self, id: &ItemId) -> Result<(), SyncError> {
        let user = self.bound_user().await?;

        self.shared.cache.write().await.remove(id);

        self.persist("delete_item", self.store.delete_item(&user, id))
            .await?;
        info!(%id, "Item permanently deleted");
        Ok(())
    }

    // ========================================================================
    // Trash view
    // ========================================================================

    /// Lists the signed-in user's trashed items
    ///
    /// The trash is read straight from the store; it is never cached.
    #[tracing::instrument(skip(self))]
    pub async fn trashed_items(&self) -> Result<Vec<PantryItem>, SyncError> {
        let user = self.bound_user().await?;
        self.store
            .query_items(&ItemFilter::trashed(user))
            .await
            .map_err(|err| SyncError::SyncUnavailable {
                reason: format!("Trash query failed: {err:#}"),
            })
    }

    /// Permanently deletes every trashed item
    ///
    /// Returns the number of items deleted. Stops at the first store
    /// failure; items already deleted stay deleted.
    #[tracing::instrument(skip(self))]
    pub async fn empty_trash(&self) -> Result<usize, SyncError> {
        let trashed = self.trashed_items().await?;
        let user = self.bound_user().await?;

        let mut deleted = 0usize;
        for item in &trashed {
            self.persist("empty_trash", self.store.delete_item(&user, item.id()))
                .await?;
            deleted += 1;
        }
        info!(deleted, "Trash emptied");
        Ok(deleted)
    }

    // ========================================================================
    // Cache-backed reads
    // ========================================================================

    /// All active items, name-sorted
    pub async fn get_active_items(&self) -> Vec<PantryItem> {
        self.shared.cache.read().await.items()
    }

    /// One active item by id
    pub async fn get_item(&self, id: &ItemId) -> Option<PantryItem> {
        self.shared.cache.read().await.get(id).cloned()
    }

    /// Active items in the given category, name-sorted
    pub async fn get_items_by_category(&self, category: &str) -> Vec<PantryItem> {
        self.shared.cache.read().await.items_in_category(category)
    }

    /// Active items whose name contains the fragment, case-insensitive
    pub async fn search_items(&self, fragment: &str) -> Vec<PantryItem> {
        let query = CacheQuery::new().with_name_contains(fragment);
        self.shared
            .cache
            .read()
            .await
            .query(&query, Utc::now().date_naive())
    }

    /// Active items expiring between today (UTC) and `days` out, inclusive
    pub async fn get_expiring_within(&self, days: i64) -> Vec<PantryItem> {
        let query = CacheQuery::new().with_expiring_within_days(days);
        self.shared
            .cache
            .read()
            .await
            .query(&query, Utc::now().date_naive())
    }

    /// Active items inside the configured expiring-soon window
    pub async fn get_expiring_soon(&self) -> Vec<PantryItem> {
        self.get_expiring_within(self.config.cache.expiring_soon_days)
            .await
    }

    /// Distinct categories among active items, sorted
    pub async fn categories(&self) -> Vec<String> {
        self.shared.cache.read().await.categories()
    }

    /// True when the cache holds a trustworthy set
    pub async fn is_ready(&self) -> bool {
        self.shared.cache.read().await.is_ready()
    }

    /// Current cache freshness status
    pub async fn cache_status(&self) -> CacheStatus {
        self.shared.cache.read().await.status().clone()
    }

    /// Current session pipeline state
    pub async fn session_state(&self) -> SessionState {
        *self.shared.state.read().await
    }

    /// Renders the active set as plain text for use outside the app
    ///
    /// One line per item in the form `Name: quantity unit`, name-sorted.
    /// An empty pantry renders as an empty string.
    pub async fn format_for_external_consumption(&self) -> String {
        let items = self.shared.cache.read().await.items();
        items
            .iter()
            .map(|item| item.summary_line())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Tests
// ============================================================================
