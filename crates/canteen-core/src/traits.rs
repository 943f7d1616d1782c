//! Collaborator traits for the offline queue
//!
//! The queue never talks to a concrete database or storage API. It is built
//! against these traits so production backends and in-memory doubles can be
//! swapped freely.
//!
//! ## Key Traits
//!
//! - [`DocumentStore`]: remote document database (collections of keyed documents)
//! - [`LocalJournal`]: durable local key/value store holding the serialized queue
//! - [`Clock`]: time abstraction for testability

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::document::{ChangeSubscription, Document};
use crate::error::{JournalError, StoreError};
use crate::operation::Payload;

/// Remote document database
///
/// Writes either resolve or reject; a rejection is treated by the queue as a
/// retryable failure.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document; fails if the id is already taken
    async fn create(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError>;

    /// Merge fields into an existing document; fails if it does not exist
    async fn update(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError>;

    /// Delete a document
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Fetch a single document
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// List every document in a collection, ordered by id
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Find documents whose top-level `field` equals `value`
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Real-time changes for a whole collection
    fn subscribe_collection(&self, collection: &str) -> ChangeSubscription;

    /// Real-time changes for a single document
    fn subscribe_document(&self, collection: &str, id: &str) -> ChangeSubscription;
}

/// Durable local key/value store
#[async_trait]
pub trait LocalJournal: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>, JournalError>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<(), JournalError>;

    /// Remove `key` if present
    async fn remove(&self, key: &str) -> Result<(), JournalError>;

    /// Whether values survive a process restart
    fn is_durable(&self) -> bool;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn create(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        (**self).create(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        (**self).update(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        (**self).delete(collection, id).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        (**self).get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        (**self).list(collection).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>, StoreError> {
        (**self).query_by_field(collection, field, value).await
    }

    fn subscribe_collection(&self, collection: &str) -> ChangeSubscription {
        (**self).subscribe_collection(collection)
    }

    fn subscribe_document(&self, collection: &str, id: &str) -> ChangeSubscription {
        (**self).subscribe_document(collection, id)
    }
}

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Current UTC time
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same underlying time.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Start at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
