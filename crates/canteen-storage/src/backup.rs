//! Collection backup and restore
//!
//! A [`Backup`] is a point-in-time copy of selected collections, serializable
//! to JSON so an admin can download it and restore it later.

use std::collections::{BTreeMap, BTreeSet};

use canteen_core::{DocumentStore, Payload, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::error::StorageError;

/// Point-in-time copy of one or more collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub created_at: DateTime<Utc>,
    /// collection -> (document id -> data)
    pub collections: BTreeMap<String, BTreeMap<String, Payload>>,
}

impl Backup {
    /// Total number of documents across all collections
    pub fn document_count(&self) -> usize {
        self.collections.values().map(BTreeMap::len).sum()
    }

    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string_pretty(self).map_err(|e| StorageError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        serde_json::from_str(json).map_err(|e| StorageError::deserialization(e.to_string()))
    }
}

/// How a restore treats documents missing from the backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreMode {
    /// Keep documents the backup does not mention
    #[default]
    Merge,
    /// Delete documents the backup does not mention
    Replace,
}

/// Counts of writes performed by a restore
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Snapshot the given collections
#[instrument(skip(store))]
pub async fn export_collections<S>(store: &S, collections: &[&str]) -> Result<Backup, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut out = BTreeMap::new();
    for collection in collections {
        let docs = store.list(collection).await?;
        let entries = docs.into_iter().map(|doc| (doc.id, doc.data)).collect();
        out.insert(collection.to_string(), entries);
    }

    let backup = Backup {
        created_at: Utc::now(),
        collections: out,
    };
    info!(documents = backup.document_count(), "Collections exported");
    Ok(backup)
}

/// Write a backup back into the store
///
/// Each document is created when absent and overwritten field-by-field when
/// present.
#[instrument(skip(store, backup), fields(documents = backup.document_count()))]
pub async fn restore_backup<S>(
    store: &S,
    backup: &Backup,
    mode: RestoreMode,
) -> Result<RestoreReport, StoreError>
where
    S: DocumentStore + ?Sized,
{
    let mut report = RestoreReport::default();

    for (collection, documents) in &backup.collections {
        let existing: BTreeSet<String> = store
            .list(collection)
            .await?
            .into_iter()
            .map(|doc| doc.id)
            .collect();

        for (id, data) in documents {
            if existing.contains(id) {
                store.update(collection, id, data.clone()).await?;
                report.updated += 1;
            } else {
                store.create(collection, id, data.clone()).await?;
                report.created += 1;
            }
        }

        if mode == RestoreMode::Replace {
            for id in existing.iter().filter(|id| !documents.contains_key(*id)) {
                store.delete(collection, id).await?;
                report.deleted += 1;
            }
        }
    }

    info!(
        created = report.created,
        updated = report.updated,
        deleted = report.deleted,
        "Backup restored"
    );
    Ok(report)
}
