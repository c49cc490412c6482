//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live with the host application.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - The remote document store holding pantry items
//! - [`ISessionProvider`] - Upstream authentication/session state

pub mod remote_store;
pub mod session;

pub use remote_store::{ChangeStream, IRemoteStore, ItemChange, ItemFilter, StoreEvent};
pub use session::ISessionProvider;
