//! In-memory document store
//!
//! A [`DocumentStore`] holding collections of keyed JSON documents in memory.
//! It backs tests and the simulation, and offers fault injection so replay
//! failures can be produced on demand.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use canteen_core::{
    ChangeFilter, ChangeKind, ChangeSubscription, Document, DocumentChange, DocumentStore,
    OperationKind, Payload, StoreError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A write the store accepted, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub kind: OperationKind,
    pub collection: String,
    pub id: String,
}

/// In-memory implementation of DocumentStore
pub struct InMemoryDocumentStore {
    /// collection -> (document id -> data)
    collections: DashMap<String, BTreeMap<String, Payload>>,
    /// Change feed shared by all subscriptions
    changes: broadcast::Sender<DocumentChange>,
    /// When false every call fails with `Unavailable`
    available: AtomicBool,
    /// Number of upcoming writes to reject
    fail_next: AtomicUsize,
    /// Accepted writes, oldest first
    write_log: Mutex<Vec<WriteRecord>>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            collections: DashMap::new(),
            changes,
            available: AtomicBool::new(true),
            fail_next: AtomicUsize::new(0),
            write_log: Mutex::new(Vec::new()),
        }
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Reject the next `count` writes
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Writes accepted so far
    pub fn write_log(&self) -> Vec<WriteRecord> {
        self.write_log.lock().clone()
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|docs| docs.len())
            .unwrap_or(0)
    }

    /// Names of every non-empty collection
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("document store offline".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), StoreError> {
        self.check_available()?;
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }
        Ok(())
    }

    fn record(&self, kind: OperationKind, collection: &str, id: &str) {
        self.write_log.lock().push(WriteRecord {
            kind,
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    fn publish(&self, kind: ChangeKind, collection: &str, id: &str, data: Payload) {
        trace!(collection, id, ?kind, "Publishing document change");
        // No subscribers is fine
        let _ = self.changes.send(DocumentChange {
            kind,
            document: Document::new(collection, id, data),
        });
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        self.check_write()?;
        {
            let mut docs = self.collections.entry(collection.to_string()).or_default();
            if docs.contains_key(id) {
                return Err(StoreError::already_exists(collection, id));
            }
            docs.insert(id.to_string(), data.clone());
        }
        debug!(collection, id, "Document created");
        self.record(OperationKind::Create, collection, id);
        self.publish(ChangeKind::Added, collection, id, data);
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        self.check_write()?;
        let merged = {
            let mut docs = self
                .collections
                .get_mut(collection)
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            let existing = docs
                .get_mut(id)
                .ok_or_else(|| StoreError::not_found(collection, id))?;
            for (field, value) in data {
                existing.insert(field, value);
            }
            existing.clone()
        };
        debug!(collection, id, "Document updated");
        self.record(OperationKind::Update, collection, id);
        self.publish(ChangeKind::Modified, collection, id, merged);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        let removed = self
            .collections
            .get_mut(collection)
            .and_then(|mut docs| docs.remove(id));
        self.record(OperationKind::Delete, collection, id);
        // Deleting a missing document succeeds without a change event
        if let Some(data) = removed {
            debug!(collection, id, "Document deleted");
            self.publish(ChangeKind::Removed, collection, id, data);
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
            .map(|data| Document::new(collection, id, data)))
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.check_available()?;
        Ok(self
            .collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(collection, id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.field(field) == Some(value))
            .collect())
    }

    fn subscribe_collection(&self, collection: &str) -> ChangeSubscription {
        ChangeSubscription::new(
            self.changes.subscribe(),
            ChangeFilter::Collection(collection.to_string()),
        )
    }

    fn subscribe_document(&self, collection: &str, id: &str) -> ChangeSubscription {
        ChangeSubscription::new(
            self.changes.subscribe(),
            ChangeFilter::Document {
                collection: collection.to_string(),
                id: id.to_string(),
            },
        )
    }
}
