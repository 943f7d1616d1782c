//! Applying a single write to the document store

use canteen_core::{
    DocumentStore, OperationKind, Payload, PendingOperation, ReplayError, StoreError,
};

/// Issue one write against the store according to its kind
pub(crate) async fn dispatch(
    store: &dyn DocumentStore,
    kind: OperationKind,
    collection: &str,
    document_id: &str,
    payload: Option<&Payload>,
) -> Result<(), StoreError> {
    let body = || payload.cloned().unwrap_or_default();
    match kind {
        OperationKind::Create => store.create(collection, document_id, body()).await,
        OperationKind::Update => store.update(collection, document_id, body()).await,
        OperationKind::Delete => store.delete(collection, document_id).await,
    }
}

/// Replay a queued operation
pub(crate) async fn replay(store: &dyn DocumentStore, op: &PendingOperation) -> Result<(), StoreError> {
    dispatch(
        store,
        op.kind,
        &op.collection,
        &op.document_id,
        op.payload.as_ref(),
    )
    .await
}

/// Classify a failed attempt against the attempt budget
///
/// `op.attempts` must already include the failed attempt.
pub(crate) fn classify(op: &PendingOperation, source: StoreError, max_attempts: u32) -> ReplayError {
    if op.attempts >= max_attempts {
        ReplayError::Permanent {
            attempts: op.attempts,
            max_attempts,
            source,
        }
    } else {
        ReplayError::Transient {
            attempts: op.attempts,
            source,
        }
    }
}
