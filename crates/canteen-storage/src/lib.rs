//! # Canteen Storage
//!
//! Storage backends for the canteen offline queue.
//!
//! ## Journals
//!
//! The pending queue is serialized to JSON and kept in a [`LocalJournal`]
//! under a single key:
//!
//! - [`InMemoryJournal`]: process-local, with write-failure injection
//! - [`FileJournal`]: one file per key, atomically replaced on write
//! - [`RedbJournal`]: single-table redb database
//!
//! ## Documents
//!
//! [`InMemoryDocumentStore`] implements [`DocumentStore`] over in-memory
//! collections. It publishes change events, records every accepted write,
//! and can be told to fail so replay behavior can be exercised.
//!
//! ## Backups
//!
//! [`export_collections`] and [`restore_backup`] copy whole collections out
//! of and back into any [`DocumentStore`].
//!
//! [`LocalJournal`]: canteen_core::LocalJournal
//! [`DocumentStore`]: canteen_core::DocumentStore

pub mod backup;
pub mod documents;
pub mod error;
pub mod journal;

pub use backup::{Backup, RestoreMode, RestoreReport, export_collections, restore_backup};
pub use documents::{InMemoryDocumentStore, WriteRecord};
pub use error::StorageError;
pub use journal::{FileJournal, InMemoryJournal, RedbJournal, RedbJournalConfig};
