//! Error types for canteen-storage
//!
//! Backends report their own failures as [`StorageError`] and convert into
//! the core [`JournalError`] at the trait boundary.

use canteen_core::JournalError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Invalid journal key
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new Database error
    pub fn database(message: impl ToString) -> Self {
        Self::Database(message.to_string())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }
}

impl From<StorageError> for JournalError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(msg) => JournalError::Io(msg),
            StorageError::Serialization(msg) | StorageError::Deserialization(msg) => {
                JournalError::Serialization(msg)
            }
            StorageError::Database(msg) | StorageError::InvalidKey(msg) => {
                JournalError::Backend(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
    }

    #[test]
    fn test_journal_error_mapping() {
        let err: JournalError = StorageError::database("table missing").into();
        assert_eq!(err, JournalError::Backend("table missing".into()));

        let err: JournalError = StorageError::deserialization("bad json").into();
        assert!(matches!(err, JournalError::Serialization(_)));

        let err: JournalError = StorageError::Io("disk full".into()).into();
        assert!(matches!(err, JournalError::Io(_)));
    }
}
