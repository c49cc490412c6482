//! The in-memory active item set
//!
//! [`ItemCache`] holds the current best-known set of active items for
//! exactly one user and serves derived views cheaply. It never performs
//! I/O and never fails; it only reflects what it is given. Trashed items
//! and items belonging to anyone but the bound owner are dropped on
//! insertion regardless of what the caller claims.
//!
//! The cache is not internally synchronized. The synchronization layer
//! owns it behind a lock and is the only writer; see `larder-sync`.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::debug;

use larder_core::domain::{ItemId, PantryItem, UserId};

// ============================================================================
// CacheStatus enum
// ============================================================================

/// Freshness state of the cache
///
/// Governs whether consumers may trust the contents. `Error` retains
/// whatever was loaded before the failure so stale reads remain possible;
/// the status itself is the staleness flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CacheStatus {
    /// Nothing loaded and nothing in flight
    #[default]
    Empty,
    /// Initial load in progress
    Loading,
    /// A full snapshot has been applied and the change stream is live
    Ready,
    /// The sync pipeline failed; contents may be stale
    Error(String),
}

impl CacheStatus {
    /// Returns true if a full snapshot has been applied
    pub fn is_ready(&self) -> bool {
        matches!(self, CacheStatus::Ready)
    }

    /// Returns true if the initial load is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, CacheStatus::Loading)
    }

    /// Returns true if the pipeline reported a failure
    pub fn is_error(&self) -> bool {
        matches!(self, CacheStatus::Error(_))
    }

    /// Returns the status name as a string (without error details)
    pub fn name(&self) -> &'static str {
        match self {
            CacheStatus::Empty => "Empty",
            CacheStatus::Loading => "Loading",
            CacheStatus::Ready => "Ready",
            CacheStatus::Error(_) => "Error",
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheStatus::Empty => write!(f, "empty"),
            CacheStatus::Loading => write!(f, "loading"),
            CacheStatus::Ready => write!(f, "ready"),
            CacheStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

// ============================================================================
// CacheQuery struct
// ============================================================================

/// Filter criteria for querying cached items
///
/// All fields are optional; when `None`, no filtering is applied for that
/// field. Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default)]
pub struct CacheQuery {
    /// Exact category match
    pub category: Option<String>,
    /// Case-insensitive substring match on the item name
    pub name_contains: Option<String>,
    /// Items expiring between today and this many days out (inclusive);
    /// already-expired items do not match
    pub expiring_within_days: Option<i64>,
}

impl CacheQuery {
    /// Creates a new empty query (matches all items)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the category filter
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets the name substring filter
    pub fn with_name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    /// Sets the expiration window filter
    pub fn with_expiring_within_days(mut self, days: i64) -> Self {
        self.expiring_within_days = Some(days);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.name_contains.is_none()
            && self.expiring_within_days.is_none()
    }
}

// ============================================================================
// ItemCache struct
// ============================================================================

/// In-memory mirror of one user's active pantry items
///
/// Keyed by item id with a derived category index. The cache is scoped to
/// the owner set by [`bind_owner`](ItemCache::bind_owner); until an owner
/// is bound nothing is admitted, which makes `clear()` + `bind_owner()`
/// the only path through which a new user's data can appear.
#[derive(Debug, Default)]
pub struct ItemCache {
    /// The user this cache instance is scoped to
    owner: Option<UserId>,
    /// Active items keyed by id
    items: HashMap<ItemId, PantryItem>,
    /// Derived index: category name to member ids
    by_category: BTreeMap<String, HashSet<ItemId>>,
    /// Freshness state maintained by the synchronization layer
    status: CacheStatus,
    /// True once a full snapshot has been applied this session;
    /// distinguishes "loaded, zero items" from "never loaded"
    primed: bool,
}

impl ItemCache {
    /// Creates an empty, unbound cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes the cache to one user
    ///
    /// Items belonging to anyone else are silently dropped on insertion
    /// from this point on. Call after [`clear`](ItemCache::clear) when a
    /// session starts.
    pub fn bind_owner(&mut self, owner: UserId) {
        debug!(owner = %owner, "Binding cache to owner");
        self.owner = Some(owner);
    }

    /// Returns the bound owner, if any
    pub fn owner(&self) -> Option<&UserId> {
        self.owner.as_ref()
    }

    /// Atomically swaps the entire active set
    ///
    /// Used on initial load and on full snapshot delivery. Trashed and
    /// foreign-owner items are filtered out before insertion. Marks the
    /// cache primed and `Ready`.
    pub fn replace_all(&mut self, items: Vec<PantryItem>) {
        let offered = items.len();
        self.items.clear();
        self.by_category.clear();

        for item in items {
            if !self.admits(&item) {
                continue;
            }
            self.index_insert(&item);
            self.items.insert(item.id().clone(), item);
        }

        self.primed = true;
        self.status = CacheStatus::Ready;
        debug!(
            admitted = self.items.len(),
            dropped = offered - self.items.len(),
            "Replaced cache contents from full snapshot"
        );
    }

    /// Inserts or overwrites by id
    ///
    /// A trashed item is evicted instead, never inserted; membership in the
    /// active set is driven by the trash flag alone.
    pub fn upsert(&mut self, item: PantryItem) {
        if item.in_trash() {
            self.remove(item.id());
            return;
        }

        if !self.admits(&item) {
            debug!(id = %item.id(), "Dropping item not admitted by this cache");
            return;
        }

        if let Some(old) = self.items.remove(item.id()) {
            self.index_remove(&old);
        }
        self.index_insert(&item);
        self.items.insert(item.id().clone(), item);
    }

    /// Unconditional eviction; returns the evicted item if present
    pub fn remove(&mut self, id: &ItemId) -> Option<PantryItem> {
        let removed = self.items.remove(id);
        if let Some(ref item) = removed {
            self.index_remove(item);
        }
        removed
    }

    /// Looks up a single item by id
    pub fn get(&self, id: &ItemId) -> Option<&PantryItem> {
        self.items.get(id)
    }

    /// Returns the current set as a name-sorted list of clones
    pub fn items(&self) -> Vec<PantryItem> {
        let mut all: Vec<PantryItem> = self.items.values().cloned().collect();
        sort_by_name(&mut all);
        all
    }

    /// Filters the set by the query, name-sorted
    ///
    /// `today` anchors the expiration-window filter.
    pub fn query(&self, query: &CacheQuery, today: NaiveDate) -> Vec<PantryItem> {
        let mut matches: Vec<PantryItem> = self
            .items
            .values()
            .filter(|item| Self::matches(item, query, today))
            .cloned()
            .collect();
        sort_by_name(&mut matches);
        matches
    }

    /// Returns all items in one category, name-sorted
    ///
    /// Uses the category index; categories match exactly.
    pub fn items_in_category(&self, category: &str) -> Vec<PantryItem> {
        let Some(ids) = self.by_category.get(category) else {
            return Vec::new();
        };
        let mut matches: Vec<PantryItem> = ids
            .iter()
            .filter_map(|id| self.items.get(id).cloned())
            .collect();
        sort_by_name(&mut matches);
        matches
    }

    /// Returns the distinct categories present, sorted
    ///
    /// Items without a category do not contribute.
    pub fn categories(&self) -> Vec<String> {
        self.by_category.keys().cloned().collect()
    }

    /// Returns true when the contents are trustworthy
    ///
    /// True only when status is `Ready` and the set is non-empty or the
    /// primed flag was set by a full snapshot.
    pub fn is_ready(&self) -> bool {
        self.status.is_ready() && (!self.items.is_empty() || self.primed)
    }

    /// Returns the freshness status
    pub fn status(&self) -> &CacheStatus {
        &self.status
    }

    /// Updates the freshness status
    ///
    /// `Error` leaves the contents in place so previously loaded data
    /// can still be served as stale.
    pub fn set_status(&mut self, status: CacheStatus) {
        self.status = status;
    }

    /// Wipes items, owner binding, and freshness state
    ///
    /// Must run before a new user's data can ever be observed; this is the
    /// single-tenancy guarantee of the cache instance.
    pub fn clear(&mut self) {
        self.items.clear();
        self.by_category.clear();
        self.owner = None;
        self.primed = false;
        self.status = CacheStatus::Empty;
    }

    /// Number of active items currently held
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no items are held
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns true if an active item with this id is held
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    // --- internals ---

    /// Admission rule: active items of the bound owner only
    fn admits(&self, item: &PantryItem) -> bool {
        !item.in_trash() && self.owner.as_ref() == Some(item.owner_id())
    }

    fn matches(item: &PantryItem, query: &CacheQuery, today: NaiveDate) -> bool {
        if let Some(ref category) = query.category {
            if item.category() != Some(category.as_str()) {
                return false;
            }
        }
        if let Some(ref fragment) = query.name_contains {
            if !item
                .name()
                .to_lowercase()
                .contains(&fragment.to_lowercase())
            {
                return false;
            }
        }
        if let Some(days) = query.expiring_within_days {
            if !item.is_expiring_within(today, days) {
                return false;
            }
        }
        true
    }

    fn index_insert(&mut self, item: &PantryItem) {
        if let Some(category) = item.category() {
            self.by_category
                .entry(category.to_string())
                .or_default()
                .insert(item.id().clone());
        }
    }

    fn index_remove(&mut self, item: &PantryItem) {
        if let Some(category) = item.category() {
            if let Some(members) = self.by_category.get_mut(category) {
                members.remove(item.id());
                if members.is_empty() {
                    self.by_category.remove(category);
                }
            }
        }
    }
}

/// Name-sorted, case-insensitive, with the id as a deterministic tie-break
fn sort_by_name(items: &mut [PantryItem]) {
    items.sort_by(|a, b| {
        a.name()
            .to_lowercase()
            .cmp(&b.name().to_lowercase())
            .then_with(|| a.id().as_str().cmp(b.id().as_str()))
    });
}

// ============================================================================
// Tests
// ============================================================================
