//! Session provider port (driven/secondary port)
//!
//! Authentication lives entirely upstream of this library. The sync layer
//! only needs one answer from it: who, if anyone, is currently signed in.
//! Token storage, refresh, and sign-in flows are the host application's
//! concern.

use crate::domain::newtypes::UserId;

/// Port trait for upstream authentication state
///
/// ## Design Notes
///
/// - `current_user` may suspend (implementations often validate or refresh
///   a token before answering), hence `#[async_trait]`.
/// - Returning `Ok(None)` means "nobody is signed in"; an `Err` means the
///   provider could not determine session state at all. The sync layer
///   treats both as an absent session.
#[async_trait::async_trait]
pub trait ISessionProvider: Send + Sync {
    /// Returns the currently authenticated user, if any
    async fn current_user(&self) -> anyhow::Result<Option<UserId>>;
}
