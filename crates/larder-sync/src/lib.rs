//! Larder Sync - session-scoped pantry synchronization
//!
//! Provides:
//! - Session lifecycle bound to the signed-in user
//! - Optimistic mutations with rollback on store failure
//! - Continuous reconciliation of the change stream into the item cache
//! - Cache-backed reads for the UI layer
//!
//! ## Modules
//!
//! - [`coordinator`] - Session lifecycle, mutations, and cache-backed reads

pub mod coordinator;

mod reconciler;

use larder_core::domain::{DomainError, ItemId};
use thiserror::Error;

pub use coordinator::{SessionState, SyncCoordinator};

/// Errors surfaced by synchronization operations
///
/// These are the categories a caller can meaningfully react to; the
/// adapter-level detail stays in the source chain.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input failed a domain rule before any remote work was attempted
    #[error("Validation failed: {0}")]
    Validation(#[from] DomainError),

    /// No signed-in user is available
    #[error("No signed-in user")]
    AuthenticationRequired,

    /// The pipeline to the store could not be established or used
    #[error("Synchronization unavailable: {reason}")]
    SyncUnavailable {
        /// Human-readable cause
        reason: String,
    },

    /// The referenced item does not exist in the store
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// A store write failed or timed out; any optimistic cache change
    /// has been rolled back
    #[error("Failed to persist change: {source}")]
    PersistenceFailed {
        /// Underlying adapter error
        #[source]
        source: anyhow::Error,
    },
}
