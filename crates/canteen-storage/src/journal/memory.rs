//! In-memory journal
//!
//! Suitable for tests and the simulation. Values do not survive the process.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use canteen_core::{JournalError, LocalJournal};
use dashmap::DashMap;
use tracing::trace;

/// In-memory implementation of LocalJournal
///
/// Failure injection via [`set_failing`](Self::set_failing) makes every
/// write fail with an I/O error, which is how persistence failures are
/// exercised in tests. [`fail_next_reads`](Self::fail_next_reads) does the
/// same for reads.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    entries: DashMap<String, String>,
    failing: AtomicBool,
    failing_reads: AtomicUsize,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `count` reads fail
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Raw value, bypassing failure injection
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check_writable(&self) -> Result<(), JournalError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(JournalError::Io("injected journal failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalJournal for InMemoryJournal {
    async fn get(&self, key: &str) -> Result<Option<String>, JournalError> {
        let injected = self
            .failing_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(JournalError::Io("injected journal read failure".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), JournalError> {
        self.check_writable()?;
        trace!(key, bytes = value.len(), "Journal set");
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), JournalError> {
        self.check_writable()?;
        self.entries.remove(key);
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}
