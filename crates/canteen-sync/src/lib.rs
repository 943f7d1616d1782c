//! # Canteen Sync
//!
//! Offline write queue for the canteen attendance app.
//!
//! Coordinators confirming attendance and admins editing menus keep working
//! when the connection drops. Their writes are journaled as pending
//! operations and replayed in order once the device is back online, with a
//! bounded number of attempts per operation.
//!
//! ## Components
//!
//! - [`OfflineSyncQueue`]: the journaled queue, replay loop, and status reporting
//! - [`OfflineAwareStore`]: write directly when possible, queue otherwise
//! - [`SyncQueueConfig`] / [`BackoffPolicy`]: attempt budget and retry spacing
//! - [`Subject`]: typed observer list behind the status and summary callbacks
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use canteen_core::{ManualConnectivity, NewOperation};
//! use canteen_storage::{FileJournal, InMemoryDocumentStore};
//! use canteen_sync::OfflineSyncQueue;
//!
//! let queue = OfflineSyncQueue::new(
//!     Arc::new(InMemoryDocumentStore::new()),
//!     Arc::new(FileJournal::open("./journal").await?),
//!     Arc::new(ManualConnectivity::new(true)),
//! );
//! queue.initialize().await?;
//! queue.on_status_change(|status| println!("{} pending", status.pending_count));
//! queue
//!     .register_pending_operation(NewOperation::delete("menus", "2024-W18"))
//!     .await?;
//! let summary = queue.sync_pending_operations().await;
//! ```

pub mod config;
pub mod observer;
pub mod queue;
mod replay;
pub mod writer;

pub use config::{BackoffPolicy, DEFAULT_JOURNAL_KEY, DEFAULT_MAX_ATTEMPTS, SyncQueueConfig};
pub use observer::{ObserverId, Subject};
pub use queue::{OfflineSyncQueue, SyncQueueBuilder};
pub use writer::{OfflineAwareStore, WriteOutcome};
