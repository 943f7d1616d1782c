//! Documents and change events delivered by a document store

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::operation::Payload;

/// A stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub data: Payload,
}

impl Document {
    pub fn new(collection: impl Into<String>, id: impl Into<String>, data: Payload) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            data,
        }
    }

    /// Read a top-level field
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.data.get(name)
    }
}

/// What happened to a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A change event from a collection or document subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    /// Document state after the change (last known state for removals)
    pub document: Document,
}

impl DocumentChange {
    /// Whether the change targets the given collection
    pub fn is_in(&self, collection: &str) -> bool {
        self.document.collection == collection
    }

    /// Whether the change targets the given document
    pub fn is_for(&self, collection: &str, id: &str) -> bool {
        self.document.collection == collection && self.document.id == id
    }
}

/// Which changes a subscription delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeFilter {
    Collection(String),
    Document { collection: String, id: String },
}

impl ChangeFilter {
    pub fn matches(&self, change: &DocumentChange) -> bool {
        match self {
            ChangeFilter::Collection(collection) => change.is_in(collection),
            ChangeFilter::Document { collection, id } => change.is_for(collection, id),
        }
    }
}

/// A live subscription to document changes
///
/// Wraps a broadcast receiver and drops events outside the filter. Lagged
/// receivers skip the lost events and keep going.
pub struct ChangeSubscription {
    rx: broadcast::Receiver<DocumentChange>,
    filter: ChangeFilter,
}

impl ChangeSubscription {
    pub fn new(rx: broadcast::Receiver<DocumentChange>, filter: ChangeFilter) -> Self {
        Self { rx, filter }
    }

    pub fn filter(&self) -> &ChangeFilter {
        &self.filter
    }

    /// Wait for the next matching change; `None` once the store is gone
    pub async fn recv(&mut self) -> Option<DocumentChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return a matching change if one is already buffered
    pub fn try_recv(&mut self) -> Option<DocumentChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
