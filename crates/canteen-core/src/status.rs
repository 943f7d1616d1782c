//! Status and sync summary types reported to subscribers

use serde::{Deserialize, Serialize};

use crate::operation::PendingOperation;

/// Snapshot of connectivity and queue state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Real connectivity signal
    pub is_online: bool,
    /// Operator override forcing offline behavior
    pub manual_offline_mode: bool,
    /// Whether the journal last loaded/persisted successfully
    pub persistence_enabled: bool,
    /// Operations still waiting for replay
    pub pending_count: usize,
}

impl SyncStatus {
    /// Effective offline flag
    pub fn is_offline(&self) -> bool {
        !self.is_online || self.manual_offline_mode
    }
}

/// An operation dropped after exhausting its attempt budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermanentFailure {
    pub operation: PendingOperation,
    pub last_error: String,
}

/// Result of one replay pass over the pending queue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Operations dispatched to the store in this pass
    pub total: usize,
    /// Operations the store accepted
    pub successful: usize,
    /// Queue length after the pass
    pub pending: usize,
    /// Operations dropped in this pass
    pub permanently_failed: Vec<PermanentFailure>,
    /// Operations held back by the backoff policy
    pub skipped: usize,
    /// Whether the updated queue reached the journal
    pub journal_persisted: bool,
}

impl SyncSummary {
    /// Summary for a pass that did not dispatch anything
    pub fn idle(pending: usize) -> Self {
        Self {
            pending,
            journal_persisted: true,
            ..Default::default()
        }
    }

    /// Operations that failed but stay queued
    pub fn failed_transient(&self) -> usize {
        self.total - self.successful - self.permanently_failed.len()
    }

    /// Whether every dispatched operation succeeded
    pub fn is_clean(&self) -> bool {
        self.successful == self.total && self.permanently_failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_offline_derivation() {
        let mut status = SyncStatus {
            is_online: true,
            manual_offline_mode: false,
            persistence_enabled: true,
            pending_count: 0,
        };
        assert!(!status.is_offline());

        status.manual_offline_mode = true;
        assert!(status.is_offline());

        status.manual_offline_mode = false;
        status.is_online = false;
        assert!(status.is_offline());
    }

    #[test]
    fn test_idle_summary() {
        let summary = SyncSummary::idle(3);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.pending, 3);
        assert!(summary.is_clean());
        assert!(summary.journal_persisted);
    }

    #[test]
    fn test_failed_transient_count() {
        let summary = SyncSummary {
            total: 4,
            successful: 1,
            pending: 3,
            ..Default::default()
        };
        assert_eq!(summary.failed_transient(), 3);
        assert!(!summary.is_clean());
    }
}
