//! Larder Cache - In-memory active item set
//!
//! The low-latency mirror of one user's active (non-trashed) pantry items:
//! - Keyed by item id, scoped to a single owner
//! - Derived views: name-sorted listing, category/text/expiry queries
//! - Freshness metadata so consumers know whether to trust the contents
//!
//! ## Architecture
//!
//! This crate owns no I/O and no locking. The synchronization layer is the
//! single writer; consumers only ever see cloned snapshots. There is no
//! persistence: the remote store is the durable copy, and this cache is
//! rebuilt from it on every session start.
//!
//! ## Key Components
//!
//! - [`ItemCache`] - The owner-bound active set with derived views
//! - [`CacheStatus`] - Freshness state (`Empty`/`Loading`/`Ready`/`Error`)
//! - [`CacheQuery`] - Composable filter for category/text/expiry views

pub mod cache;

pub use cache::{CacheQuery, CacheStatus, ItemCache};
