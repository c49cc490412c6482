//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures and invalid lifecycle transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Invalid item identifier format
    #[error("Invalid item id: {0}")]
    InvalidItemId(String),

    /// Invalid user identifier format
    #[error("Invalid user id: {0}")]
    InvalidUserId(String),

    /// Item name is empty or whitespace-only
    #[error("Item name must not be empty")]
    EmptyName,

    /// Quantity must be strictly positive for new items
    #[error("Quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(f64),

    /// Quantity may never be negative
    #[error("Quantity must not be negative, got {0}")]
    NegativeQuantity(f64),

    /// Quantity is NaN or infinite
    #[error("Quantity must be a finite number")]
    NonFiniteQuantity,

    /// Invalid trash lifecycle transition attempt
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Item belongs to a user other than the one acting on it
    #[error("Item belongs to a different owner")]
    OwnerMismatch,
}
