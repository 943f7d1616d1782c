//! Integration tests for canteen-storage
//!
//! Runs the same journal contract against every backend and exercises the
//! document store under concurrent writers.

use std::sync::Arc;

use canteen_core::{DocumentStore, LocalJournal, OperationKind, Payload};
use canteen_storage::{
    FileJournal, InMemoryDocumentStore, InMemoryJournal, RedbJournal, RedbJournalConfig,
    RestoreMode, export_collections, restore_backup,
};
use serde_json::json;
use tempfile::TempDir;

fn payload(key: &str, value: serde_json::Value) -> Payload {
    let mut p = Payload::new();
    p.insert(key.to_string(), value);
    p
}

async fn check_journal_contract(journal: &dyn LocalJournal) {
    assert!(journal.get("pending_operations").await.unwrap().is_none());

    journal.set("pending_operations", "[]").await.unwrap();
    journal.set("other", "{\"a\":1}").await.unwrap();
    journal
        .set("pending_operations", "[{\"id\":\"1\"}]")
        .await
        .unwrap();

    assert_eq!(
        journal.get("pending_operations").await.unwrap().as_deref(),
        Some("[{\"id\":\"1\"}]")
    );
    assert_eq!(
        journal.get("other").await.unwrap().as_deref(),
        Some("{\"a\":1}")
    );

    journal.remove("other").await.unwrap();
    assert!(journal.get("other").await.unwrap().is_none());
    journal.remove("never-set").await.unwrap();
}

// ============================================================================
// Journal Contract
// ============================================================================

#[tokio::test]
async fn test_in_memory_journal_contract() {
    let journal = InMemoryJournal::new();
    check_journal_contract(&journal).await;
    assert!(!journal.is_durable());
}

#[tokio::test]
async fn test_file_journal_contract() {
    let temp = TempDir::new().unwrap();
    let journal = FileJournal::open(temp.path().join("journal")).await.unwrap();
    check_journal_contract(&journal).await;
    assert!(journal.is_durable());
}

#[tokio::test]
async fn test_redb_journal_contract() {
    let temp = TempDir::new().unwrap();
    let config = RedbJournalConfig::with_path(temp.path().join("journal.redb"));
    let journal = RedbJournal::open(config).unwrap();
    check_journal_contract(&journal).await;
    assert!(journal.is_durable());
}

#[test]
fn test_journal_usable_from_blocking_context() {
    let journal = InMemoryJournal::new();
    tokio_test::block_on(async {
        journal.set("k", "v").await.unwrap();
    });
    assert_eq!(journal.raw("k").as_deref(), Some("v"));
}

// ============================================================================
// Document Store
// ============================================================================

#[tokio::test]
async fn test_concurrent_writers() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let mut handles = Vec::new();

    for worker in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for i in 0..25 {
                let id = format!("w{}-{}", worker, i);
                store
                    .create("attendance", &id, payload("count", json!(i)))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.count("attendance"), 200);
    let log = store.write_log();
    assert_eq!(log.len(), 200);
    assert!(log.iter().all(|w| w.kind == OperationKind::Create));
}

#[tokio::test]
async fn test_store_usable_as_trait_object() {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    store
        .create("coordinators", "luis", payload("area", json!("HR")))
        .await
        .unwrap();

    let listed = store.list("coordinators").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "luis");
}

#[tokio::test]
async fn test_backup_between_stores() {
    let source = InMemoryDocumentStore::new();
    for day in ["monday", "tuesday", "wednesday"] {
        source
            .create("menus", day, payload("dish", json!(format!("{} special", day))))
            .await
            .unwrap();
    }

    let json = export_collections(&source, &["menus"])
        .await
        .unwrap()
        .to_json()
        .unwrap();

    let target = InMemoryDocumentStore::new();
    let backup = canteen_storage::Backup::from_json(&json).unwrap();
    let report = restore_backup(&target, &backup, RestoreMode::Replace)
        .await
        .unwrap();

    assert_eq!(report.created, 3);
    assert_eq!(
        target.list("menus").await.unwrap(),
        source.list("menus").await.unwrap()
    );
}
