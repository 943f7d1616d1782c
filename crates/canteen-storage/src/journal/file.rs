//! File-backed journal
//!
//! Each key is stored in its own file under a directory. Writes go to a
//! temporary sibling first and are renamed into place, so a crash mid-write
//! leaves the previous value intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use canteen_core::{JournalError, LocalJournal};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, trace};

use crate::error::StorageError;

const VALUE_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "json.tmp";

/// Directory-per-journal, file-per-key LocalJournal
#[derive(Debug, Clone)]
pub struct FileJournal {
    dir: PathBuf,
    sync_writes: bool,
}

impl FileJournal {
    /// Open (creating if needed) a journal directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_options(dir, true).await
    }

    /// Open with explicit fsync behavior
    pub async fn with_options(dir: impl AsRef<Path>, sync_writes: bool) -> Result<Self, StorageError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        debug!(path = ?dir, "Opened file journal");
        Ok(Self { dir, sync_writes })
    }

    /// Directory holding the journal files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn value_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .dir
            .join(format!("{}.{}", file_stem(key)?, VALUE_EXTENSION)))
    }

    fn temp_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .dir
            .join(format!("{}.{}", file_stem(key)?, TEMP_EXTENSION)))
    }

    async fn write_atomic(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let temp = self.temp_path(key)?;
        let target = self.value_path(key)?;

        let mut file = fs::File::create(&temp).await?;
        file.write_all(value.as_bytes()).await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        drop(file);

        fs::rename(&temp, &target).await?;
        trace!(path = ?target, bytes = value.len(), "Journal file written");
        Ok(())
    }
}

/// Map a journal key to its file stem
///
/// Keys are limited to ASCII alphanumerics, `-` and `_` so that distinct
/// keys never share a file.
fn file_stem(key: &str) -> Result<String, StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".to_string()));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(StorageError::InvalidKey(format!(
            "{key:?} contains {bad:?}; only ASCII letters, digits, '-' and '_' are allowed"
        )));
    }
    Ok(key.to_string())
}

#[async_trait]
impl LocalJournal for FileJournal {
    async fn get(&self, key: &str) -> Result<Option<String>, JournalError> {
        let path = self.value_path(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, value), fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: &str) -> Result<(), JournalError> {
        self.write_atomic(key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), JournalError> {
        let path = self.value_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_durable(&self) -> bool {
        true
    }
}
