//! Error types for the canteen offline queue

use thiserror::Error;

/// Top-level error type for canteen operations
#[derive(Debug, Error)]
pub enum CanteenError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),
}

/// A malformed operation was handed to the queue
///
/// These are surfaced synchronously to the caller; the operation is never
/// enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid operation kind: {0}")]
    InvalidKind(String),

    #[error("{kind} operation requires a payload")]
    MissingPayload { kind: String },

    #[error("{kind} operation requires a non-empty payload")]
    EmptyPayload { kind: String },

    #[error("{kind} operation must not carry a payload")]
    UnexpectedPayload { kind: String },

    #[error("Collection name must not be empty")]
    EmptyCollection,

    #[error("Document id must not be empty")]
    EmptyDocumentId,
}

/// Errors returned by a [`DocumentStore`](crate::traits::DocumentStore)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Document already exists: {collection}/{id}")]
    AlreadyExists { collection: String, id: String },

    #[error("Write rejected: {0}")]
    Rejected(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Create a new NotFound error
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a new AlreadyExists error
    pub fn already_exists(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Errors from the durable local journal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("Journal I/O error: {0}")]
    Io(String),

    #[error("Journal serialization error: {0}")]
    Serialization(String),

    #[error("Journal backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for JournalError {
    fn from(err: std::io::Error) -> Self {
        JournalError::Io(err.to_string())
    }
}

/// Outcome of a failed replay of a single pending operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplayError {
    /// The store call failed; the operation stays queued
    #[error("Replay failed after {attempts} attempt(s): {source}")]
    Transient { attempts: u32, source: StoreError },

    /// The attempt budget is exhausted; the operation is dropped
    #[error("Replay abandoned after {attempts}/{max_attempts} attempts: {source}")]
    Permanent {
        attempts: u32,
        max_attempts: u32,
        source: StoreError,
    },
}

impl ReplayError {
    /// Whether the operation was dropped for good
    pub fn is_permanent(&self) -> bool {
        matches!(self, ReplayError::Permanent { .. })
    }
}

/// Result type alias for canteen operations
pub type CanteenResult<T> = Result<T, CanteenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::MissingPayload {
            kind: "create".to_string(),
        };
        assert!(err.to_string().contains("create"));
        assert!(err.to_string().contains("requires a payload"));

        let err = ValidationError::InvalidKind("upsert".to_string());
        assert!(err.to_string().contains("upsert"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::not_found("menus", "week-12");
        assert_eq!(err.to_string(), "Document not found: menus/week-12");

        let err = StoreError::Unavailable("offline".to_string());
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn test_replay_error_permanence() {
        let transient = ReplayError::Transient {
            attempts: 2,
            source: StoreError::Unavailable("timeout".into()),
        };
        assert!(!transient.is_permanent());

        let permanent = ReplayError::Permanent {
            attempts: 5,
            max_attempts: 5,
            source: StoreError::Rejected("denied".into()),
        };
        assert!(permanent.is_permanent());
        assert!(permanent.to_string().contains("5/5"));
    }

    #[test]
    fn test_error_conversions() {
        let err: CanteenError = ValidationError::EmptyCollection.into();
        assert!(matches!(err, CanteenError::Validation(_)));

        let err: CanteenError = JournalError::Io("disk full".into()).into();
        assert!(matches!(err, CanteenError::Journal(_)));
        assert!(err.to_string().contains("disk full"));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let journal_err: JournalError = io_err.into();
        assert!(matches!(journal_err, JournalError::Io(_)));
    }
}
