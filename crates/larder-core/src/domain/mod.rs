//! Domain entities and business logic
//!
//! This module contains the core domain types for Larder:
//! - Newtypes for type-safe identifiers
//! - The `PantryItem` entity and its trash lifecycle state machine
//! - Input drafts with validation
//! - Domain-specific error types

pub mod errors;
pub mod item;
pub mod newtypes;

// Re-export commonly used types
pub use errors::DomainError;
pub use item::{ExpiryStatus, ItemDraft, NutritionFacts, PantryItem, TrashState};
pub use newtypes::{ItemId, UserId};
