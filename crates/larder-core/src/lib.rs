//! Larder Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `PantryItem`, `ItemDraft`, the trash lifecycle
//! - **Newtypes** - Validated identifiers (`ItemId`, `UserId`)
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ISessionProvider`
//! - **Configuration** - YAML-backed settings with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no external dependencies.
//! Ports define trait interfaces that the synchronization layer and the host
//! application's adapters implement. No I/O happens in this crate.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
