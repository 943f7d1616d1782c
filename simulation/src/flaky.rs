//! Document store that rejects writes at random

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use canteen_core::{ChangeSubscription, Document, DocumentStore, Payload, StoreError};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Wraps a store and fails each write with probability `failure_rate`
///
/// Reads and subscriptions pass straight through.
pub struct FlakyStore<S> {
    inner: Arc<S>,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    rejected: AtomicUsize,
}

impl<S: DocumentStore> FlakyStore<S> {
    /// `failure_rate` is clamped to `[0, 1]`
    pub fn new(inner: Arc<S>, failure_rate: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            rng: Mutex::new(rng),
            rejected: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Writes rejected so far
    pub fn rejected(&self) -> usize {
        self.rejected.load(Ordering::SeqCst)
    }

    fn roll(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        if self.rng.lock().random_bool(self.failure_rate) {
            self.rejected.fetch_add(1, Ordering::SeqCst);
            trace!(collection, id, "Rejecting write");
            return Err(StoreError::Unavailable(format!(
                "simulated outage writing {collection}/{id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn create(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        self.roll(collection, id)?;
        self.inner.create(collection, id, data).await
    }

    async fn update(&self, collection: &str, id: &str, data: Payload) -> Result<(), StoreError> {
        self.roll(collection, id)?;
        self.inner.update(collection, id, data).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.roll(collection, id)?;
        self.inner.delete(collection, id).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.inner.get(collection, id).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.inner.list(collection).await
    }

    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.inner.query_by_field(collection, field, value).await
    }

    fn subscribe_collection(&self, collection: &str) -> ChangeSubscription {
        self.inner.subscribe_collection(collection)
    }

    fn subscribe_document(&self, collection: &str, id: &str) -> ChangeSubscription {
        self.inner.subscribe_document(collection, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canteen_storage::InMemoryDocumentStore;

    fn attendance() -> Payload {
        let mut data = Payload::new();
        data.insert("confirmed".into(), serde_json::json!(true));
        data
    }

    #[tokio::test]
    async fn test_never_fails_at_zero() {
        let store = FlakyStore::new(Arc::new(InMemoryDocumentStore::new()), 0.0, Some(1));
        for i in 0..20 {
            store.create("attendance", &format!("a{i}"), attendance()).await.unwrap();
        }
        assert_eq!(store.rejected(), 0);
        assert_eq!(store.inner().count("attendance"), 20);
    }

    #[tokio::test]
    async fn test_always_fails_at_one() {
        let store = FlakyStore::new(Arc::new(InMemoryDocumentStore::new()), 1.0, Some(1));
        let result = store.create("attendance", "a1", attendance()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.rejected(), 1);
        assert_eq!(store.inner().count("attendance"), 0);
    }

    #[tokio::test]
    async fn test_reads_bypass_failures() {
        let inner = Arc::new(InMemoryDocumentStore::new());
        inner.create("menus", "m1", attendance()).await.unwrap();

        let store = FlakyStore::new(inner, 1.0, None);
        assert!(store.get("menus", "m1").await.unwrap().is_some());
        assert_eq!(store.list("menus").await.unwrap().len(), 1);
    }

    #[test]
    fn test_rate_is_clamped() {
        let store = FlakyStore::new(Arc::new(InMemoryDocumentStore::new()), 7.5, Some(3));
        assert_eq!(store.failure_rate, 1.0);
    }
}
