//! LocalJournal backends
//!
//! - [`InMemoryJournal`]: volatile, with failure injection for tests
//! - [`FileJournal`]: one file per key, atomic replace on write
//! - [`RedbJournal`]: single-table redb database

mod file;
mod memory;
mod redb_journal;

pub use file::FileJournal;
pub use memory::InMemoryJournal;
pub use redb_journal::{RedbJournal, RedbJournalConfig};
