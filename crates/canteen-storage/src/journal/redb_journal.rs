//! redb-backed journal
//!
//! Stores every journal key in a single `journal` table. Each `set` is its
//! own write transaction, so a committed value is durable once the call
//! returns.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use canteen_core::{JournalError, LocalJournal};
use redb::{Database, ReadableTable, TableDefinition};
use tracing::{debug, info, instrument};

use crate::error::StorageError;

// Key: journal key, Value: serialized value
const JOURNAL: TableDefinition<&str, &str> = TableDefinition::new("journal");

/// Configuration for the redb journal
#[derive(Debug, Clone)]
pub struct RedbJournalConfig {
    /// Path to the database file
    pub db_path: PathBuf,
}

impl Default for RedbJournalConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/canteen-journal.redb"),
        }
    }
}

impl RedbJournalConfig {
    pub fn with_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

/// LocalJournal persisted in a redb database
#[derive(Clone)]
pub struct RedbJournal {
    db: Arc<Database>,
    config: RedbJournalConfig,
}

impl RedbJournal {
    /// Open or create the database
    #[instrument(skip(config), fields(path = %config.db_path.display()))]
    pub fn open(config: RedbJournalConfig) -> Result<Self, StorageError> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&config.db_path).map_err(StorageError::database)?;
        info!("Opened redb journal");

        let journal = Self {
            db: Arc::new(db),
            config,
        };
        journal.init_table()?;
        Ok(journal)
    }

    pub fn config(&self) -> &RedbJournalConfig {
        &self.config
    }

    fn init_table(&self) -> Result<(), StorageError> {
        let write_txn = self.db.begin_write().map_err(StorageError::database)?;
        write_txn
            .open_table(JOURNAL)
            .map_err(StorageError::database)?;
        write_txn.commit().map_err(StorageError::database)?;
        debug!("Initialized journal table");
        Ok(())
    }

    /// Run a blocking database closure off the async executor
    async fn blocking<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StorageError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(StorageError::database)?
    }
}

fn read_value(db: &Database, key: &str) -> Result<Option<String>, StorageError> {
    let read_txn = db.begin_read().map_err(StorageError::database)?;
    let table = read_txn.open_table(JOURNAL).map_err(StorageError::database)?;
    let value = table
        .get(key)
        .map_err(StorageError::database)?
        .map(|guard| guard.value().to_string());
    Ok(value)
}

fn write_value(db: &Database, key: &str, value: Option<&str>) -> Result<(), StorageError> {
    let write_txn = db.begin_write().map_err(StorageError::database)?;
    {
        let mut table = write_txn
            .open_table(JOURNAL)
            .map_err(StorageError::database)?;
        match value {
            Some(value) => {
                table.insert(key, value).map_err(StorageError::database)?;
            }
            None => {
                table.remove(key).map_err(StorageError::database)?;
            }
        }
    }
    write_txn.commit().map_err(StorageError::database)?;
    Ok(())
}

#[async_trait]
impl LocalJournal for RedbJournal {
    async fn get(&self, key: &str) -> Result<Option<String>, JournalError> {
        let key = key.to_string();
        Ok(self.blocking(move |db| read_value(db, &key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), JournalError> {
        let key = key.to_string();
        let value = value.to_string();
        self.blocking(move |db| write_value(db, &key, Some(&value)))
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), JournalError> {
        let key = key.to_string();
        self.blocking(move |db| write_value(db, &key, None)).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }
}
