//! # Canteen Core
//!
//! Core traits, types, and errors for the canteen attendance offline queue.
//!
//! Coordinators confirm weekly attendance and admins edit menus from
//! devices that are not always connected. Writes that cannot reach the
//! document store are recorded as pending operations and replayed later.
//! This crate holds the vocabulary shared by the storage backends and the
//! sync queue.
//!
//! ## Key Traits
//!
//! - [`DocumentStore`]: remote document database
//! - [`LocalJournal`]: durable local key/value store for the pending queue
//! - [`ConnectivityMonitor`]: online/offline signal
//! - [`Clock`]: time abstraction for testability
//!
//! ## Key Types
//!
//! - [`PendingOperation`]: a queued write intent
//! - [`NewOperation`]: a write intent as described by the caller
//! - [`SyncStatus`] / [`SyncSummary`]: what subscribers observe

pub mod connectivity;
pub mod document;
pub mod error;
pub mod operation;
pub mod status;
pub mod traits;

// Re-export main types
pub use connectivity::*;
pub use document::*;
pub use error::*;
pub use operation::*;
pub use status::*;
pub use traits::*;
