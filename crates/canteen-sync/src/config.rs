//! Queue configuration and retry backoff

use canteen_core::PendingOperation;
use chrono::{DateTime, Duration, Utc};

/// Journal key the pending list is stored under
pub const DEFAULT_JOURNAL_KEY: &str = "pending_operations";

/// Replay attempts before an operation is dropped
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Largest exponent applied to the backoff base
const MAX_BACKOFF_EXPONENT: u32 = 20;

/// When a failed operation becomes eligible for another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffPolicy {
    /// Retry on every sync pass
    #[default]
    None,
    /// Wait `base * 2^(attempts - 1)`, capped at `max`, after each failure
    Exponential { base: Duration, max: Duration },
}

impl BackoffPolicy {
    pub fn exponential(base: Duration, max: Duration) -> Self {
        BackoffPolicy::Exponential { base, max }
    }

    /// Delay required after `attempts` failed attempts
    pub fn delay_after(&self, attempts: u32) -> Option<Duration> {
        match *self {
            BackoffPolicy::None => None,
            BackoffPolicy::Exponential { .. } if attempts == 0 => None,
            BackoffPolicy::Exponential { base, max } => {
                let exponent = (attempts - 1).min(MAX_BACKOFF_EXPONENT);
                let delay = base.checked_mul(1i32 << exponent).unwrap_or(max);
                Some(delay.min(max))
            }
        }
    }

    /// Earliest instant the operation may be replayed again
    pub fn next_attempt_at(&self, op: &PendingOperation) -> Option<DateTime<Utc>> {
        let delay = self.delay_after(op.attempts)?;
        op.last_attempt_at.map(|last| last + delay)
    }

    /// Whether the operation may be replayed at `now`
    pub fn is_due(&self, op: &PendingOperation, now: DateTime<Utc>) -> bool {
        self.next_attempt_at(op).is_none_or(|at| now >= at)
    }
}

/// Configuration for [`OfflineSyncQueue`](crate::OfflineSyncQueue)
#[derive(Debug, Clone)]
pub struct SyncQueueConfig {
    /// Journal key the serialized queue is stored under
    pub journal_key: String,
    /// Attempts before an operation is reported as permanently failed
    pub max_attempts: u32,
    /// Delay between attempts of the same operation
    pub backoff: BackoffPolicy,
    /// Start a background sync after each registration while online
    pub auto_sync_on_register: bool,
    /// Buffer size of the status and summary channels
    pub status_channel_capacity: usize,
}

impl Default for SyncQueueConfig {
    fn default() -> Self {
        Self {
            journal_key: DEFAULT_JOURNAL_KEY.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: BackoffPolicy::None,
            auto_sync_on_register: true,
            status_channel_capacity: 64,
        }
    }
}

impl SyncQueueConfig {
    pub fn with_journal_key(mut self, key: impl Into<String>) -> Self {
        self.journal_key = key.into();
        self
    }

    /// Set the attempt budget (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_auto_sync_on_register(mut self, enabled: bool) -> Self {
        self.auto_sync_on_register = enabled;
        self
    }

    pub fn with_status_channel_capacity(mut self, capacity: usize) -> Self {
        self.status_channel_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_core::{NewOperation, OperationKind};

    fn failed_op(attempts: u32, last: DateTime<Utc>) -> PendingOperation {
        let mut op = PendingOperation::from_new(NewOperation::delete("menus", "m1"), last).unwrap();
        op.attempts = attempts;
        op.last_attempt_at = Some(last);
        op
    }

    #[test]
    fn test_default_config() {
        let config = SyncQueueConfig::default();
        assert_eq!(config.journal_key, "pending_operations");
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff, BackoffPolicy::None);
        assert!(config.auto_sync_on_register);
    }

    #[test]
    fn test_builders_clamp() {
        let config = SyncQueueConfig::default()
            .with_max_attempts(0)
            .with_status_channel_capacity(0)
            .with_journal_key("queue");
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.status_channel_capacity, 1);
        assert_eq!(config.journal_key, "queue");
    }

    #[test]
    fn test_no_backoff_always_due() {
        let now = Utc::now();
        let op = failed_op(4, now);
        assert!(BackoffPolicy::None.is_due(&op, now));
        assert_eq!(op.kind, OperationKind::Delete);
    }

    #[test]
    fn test_exponential_delays() {
        let policy = BackoffPolicy::exponential(Duration::seconds(30), Duration::seconds(300));
        assert_eq!(policy.delay_after(0), None);
        assert_eq!(policy.delay_after(1), Some(Duration::seconds(30)));
        assert_eq!(policy.delay_after(2), Some(Duration::seconds(60)));
        assert_eq!(policy.delay_after(4), Some(Duration::seconds(240)));
        assert_eq!(policy.delay_after(5), Some(Duration::seconds(300)));
        assert_eq!(policy.delay_after(u32::MAX), Some(Duration::seconds(300)));
    }

    #[test]
    fn test_exponential_is_due() {
        let policy = BackoffPolicy::exponential(Duration::seconds(30), Duration::seconds(300));
        let last = Utc::now();
        let op = failed_op(2, last);

        assert!(!policy.is_due(&op, last + Duration::seconds(59)));
        assert!(policy.is_due(&op, last + Duration::seconds(60)));

        // Never attempted: always due
        let fresh = PendingOperation::from_new(NewOperation::delete("menus", "m2"), last).unwrap();
        assert!(policy.is_due(&fresh, last));
    }
}
