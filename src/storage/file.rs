//! JSON-file implementation of StateStorage
//!
//! All keys live in one JSON object on disk. The file is read on first use
//! and rewritten in full on every write.

use crate::core::error::{Result, StorageError};
use crate::core::persistence::StateStorage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// File-backed storage
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStorage {
    /// Use `path` as the backing file; it is created on the first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content).map_err(StorageError::from)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(self.io_error(e).into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let content = serde_json::to_string_pretty(entries).map_err(StorageError::from)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn io_error(&self, e: std::io::Error) -> StorageError {
        StorageError::Io {
            key: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl StateStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }
        Ok(cache.as_ref().and_then(|entries| entries.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut entries = match cache.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        entries.insert(key.to_string(), value.to_string());
        let written = self.persist(&entries).await;
        *cache = Some(entries);
        written
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut cache = self.cache.lock().await;
        let mut entries = match cache.take() {
            Some(entries) => entries,
            None => self.load().await?,
        };
        let written = if entries.remove(key).is_some() {
            self.persist(&entries).await
        } else {
            Ok(())
        };
        *cache = Some(entries);
        written
    }
}
