//! Direct writes with queue fallback
//!
//! Screens write through [`OfflineAwareStore`]: while online the write goes
//! straight to the document store; while offline, or when the store rejects
//! it, the write is handed to the [`OfflineSyncQueue`] instead.

use canteen_core::{CanteenResult, NewOperation, OperationId, Payload};
use tracing::{debug, instrument, warn};

use crate::queue::OfflineSyncQueue;
use crate::replay;

/// What happened to a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The store accepted the write
    Applied,
    /// The write was queued for replay
    Queued(OperationId),
}

impl WriteOutcome {
    pub fn is_queued(&self) -> bool {
        matches!(self, WriteOutcome::Queued(_))
    }
}

/// Document writes that survive being offline
#[derive(Clone)]
pub struct OfflineAwareStore {
    queue: OfflineSyncQueue,
}

impl OfflineAwareStore {
    pub fn new(queue: OfflineSyncQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &OfflineSyncQueue {
        &self.queue
    }

    pub async fn create(&self, collection: &str, id: &str, data: Payload) -> CanteenResult<WriteOutcome> {
        self.write(NewOperation::create(collection, id, data)).await
    }

    pub async fn update(&self, collection: &str, id: &str, data: Payload) -> CanteenResult<WriteOutcome> {
        self.write(NewOperation::update(collection, id, data)).await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> CanteenResult<WriteOutcome> {
        self.write(NewOperation::delete(collection, id)).await
    }

    /// Apply `op` directly, or queue it
    ///
    /// Invalid operations are rejected before either path is tried.
    #[instrument(
        skip(self, op),
        fields(kind = %op.kind, collection = %op.collection, document_id = %op.document_id)
    )]
    pub async fn write(&self, op: NewOperation) -> CanteenResult<WriteOutcome> {
        op.validate()?;

        if self.queue.is_offline() {
            debug!("Offline; queueing write");
            return self.enqueue(op).await;
        }

        let store = self.queue.store();
        let direct = replay::dispatch(
            store.as_ref(),
            op.kind,
            &op.collection,
            &op.document_id,
            op.payload.as_ref(),
        )
        .await;

        match direct {
            Ok(()) => Ok(WriteOutcome::Applied),
            Err(e) => {
                warn!(error = %e, "Direct write failed; queueing");
                self.enqueue(op).await
            }
        }
    }

    async fn enqueue(&self, op: NewOperation) -> CanteenResult<WriteOutcome> {
        let id = self.queue.register_pending_operation(op).await?;
        Ok(WriteOutcome::Queued(id))
    }
}
