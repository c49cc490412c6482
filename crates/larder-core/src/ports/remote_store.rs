//! Remote store port (driven/secondary port)
//!
//! This module defines the interface to the remote document store holding
//! every user's pantry items. The primary implementation targets a managed
//! cloud document database, but the trait is storage-agnostic; anything
//! that can run scoped queries, single-document writes, and a push
//! subscription can back it.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.
//! - [`StoreEvent`] and [`ItemChange`] are port-level payloads delivered on
//!   the subscription channel; the sync layer is responsible for reconciling
//!   them into the cache.
//! - The store, not the client, is authoritative for ids and the
//!   `updated_at` stamp. `create_item` and `update_item` therefore return
//!   the item as the store recorded it.

use tokio::sync::mpsc;

use crate::domain::item::PantryItem;
use crate::domain::newtypes::{ItemId, UserId};

// ============================================================================
// ItemFilter struct
// ============================================================================

/// Scope and filter for item queries and subscriptions
///
/// Every query is scoped to one owner; the `trashed` flag selects between
/// the active set and the trash. Results are ordered by name, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    /// The owning user whose items are selected
    pub owner_id: UserId,
    /// When true, selects trashed items instead of active ones
    pub trashed: bool,
}

impl ItemFilter {
    /// Filter selecting a user's active (non-trashed) items
    pub fn active(owner_id: UserId) -> Self {
        Self {
            owner_id,
            trashed: false,
        }
    }

    /// Filter selecting a user's trashed items
    pub fn trashed(owner_id: UserId) -> Self {
        Self {
            owner_id,
            trashed: true,
        }
    }
}

// ============================================================================
// Subscription payloads
// ============================================================================

/// A single change within an incremental delivery
#[derive(Debug, Clone)]
pub enum ItemChange {
    /// An item newly matching the subscribed filter
    Added(PantryItem),
    /// An item that changed while still matching the filter
    Modified(PantryItem),
    /// An item that stopped matching the filter (trashed, deleted, or
    /// re-scoped); only the id survives removal
    Removed(ItemId),
}

impl ItemChange {
    /// Returns the id of the item this change refers to
    pub fn item_id(&self) -> &ItemId {
        match self {
            ItemChange::Added(item) | ItemChange::Modified(item) => item.id(),
            ItemChange::Removed(id) => id,
        }
    }
}

/// One delivery on the subscription channel
///
/// Stores may deliver either a full replacement of the subscribed result
/// set or an incremental change list. Delivery is at-least-once: a
/// redelivered snapshot or change must be harmless to reapply.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// The complete current result set for the subscribed filter
    Snapshot(Vec<PantryItem>),
    /// Incremental changes, in the store's delivery order
    Changes(Vec<ItemChange>),
}

/// Receiving end of a change subscription
///
/// The sender side is owned by the store adapter; the channel closing
/// means the subscription is gone (revoked, transport lost, or dropped by
/// the adapter) and will not resume.
pub type ChangeStream = mpsc::Receiver<StoreEvent>;

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote pantry-item document store
///
/// This is the single interface for all interactions with the backing
/// store. Implementations handle transport, serialization, and credentials.
///
/// ## Contract
///
/// - Queries return items ordered by name, ascending.
/// - `updated_at` is stamped by the store and is monotonic per item; it is
///   the last-writer-wins tie-breaker downstream.
/// - Subscriptions deliver at least once; duplicates are permitted and
///   full snapshots may be redelivered at any time.
/// - Deleting an id that does not exist is not an error.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Runs a one-shot query for the filtered item set
    ///
    /// # Arguments
    /// * `filter` - Owner scope and trash selection
    ///
    /// # Returns
    /// Matching items, ordered by name ascending
    async fn query_items(&self, filter: &ItemFilter) -> anyhow::Result<Vec<PantryItem>>;

    /// Fetches a single item by id within an owner's scope
    ///
    /// # Returns
    /// `None` if no such document exists
    async fn fetch_item(
        &self,
        owner_id: &UserId,
        id: &ItemId,
    ) -> anyhow::Result<Option<PantryItem>>;

    /// Creates a new document for the item
    ///
    /// The store assigns the final id and timestamps regardless of what the
    /// provisional item carries.
    ///
    /// # Returns
    /// The item as recorded by the store (final id, server timestamps)
    async fn create_item(&self, item: &PantryItem) -> anyhow::Result<PantryItem>;

    /// Overwrites the item's document
    ///
    /// Whole-document write; the store re-stamps `updated_at`.
    ///
    /// # Returns
    /// The item as recorded by the store
    async fn update_item(&self, item: &PantryItem) -> anyhow::Result<PantryItem>;

    /// Permanently removes the item's document
    async fn delete_item(&self, owner_id: &UserId, id: &ItemId) -> anyhow::Result<()>;

    /// Opens a push subscription for the filtered item set
    ///
    /// # Returns
    /// A channel of [`StoreEvent`]s; the channel closing signals that the
    /// subscription is dead and must be re-established
    async fn subscribe(&self, filter: &ItemFilter) -> anyhow::Result<ChangeStream>;
}
