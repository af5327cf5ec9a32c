//! Shared test harness for storage backend testing
//!
//! Provides the `state_storage_tests!` conformance suite plus signers and
//! helpers used by the manager integration tests.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod state_storage_tests;

use async_trait::async_trait;
use list_filter::core::error::{Result, SignatureError};
use list_filter::core::persistence::StateStorage;
use list_filter::storage::FileStorage;
use list_filter::prelude::{FilterMap, FilterState, FilterValue, Sha256Signer, Signature, Signer};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Signers
// ---------------------------------------------------------------------------

/// SHA-256 signer that sleeps before hashing, to hold the apply guard
pub struct SlowSigner {
    pub delay: Duration,
}

impl SlowSigner {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
        }
    }
}

#[async_trait]
impl Signer for SlowSigner {
    async fn digest(&self, canonical: String) -> Result<Signature> {
        tokio::time::sleep(self.delay).await;
        Sha256Signer.digest(canonical).await
    }
}

/// Signer whose digest always fails
pub struct FailingSigner;

#[async_trait]
impl Signer for FailingSigner {
    async fn digest(&self, _canonical: String) -> Result<Signature> {
        Err(SignatureError::Digest {
            message: "digest unavailable".to_string(),
        }
        .into())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records every callback invocation
#[derive(Clone, Default)]
pub struct CallbackRecorder {
    calls: Arc<Mutex<Vec<(FilterState, String)>>>,
    count: Arc<AtomicUsize>,
}

impl CallbackRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(&FilterState, &str) + Send + Sync + 'static {
        let recorder = self.clone();
        move |params, query| {
            recorder.count.fetch_add(1, Ordering::SeqCst);
            recorder
                .calls
                .lock()
                .unwrap()
                .push((params.clone(), query.to_string()));
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last(&self) -> Option<(FilterState, String)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

/// File storage inside a temporary directory that is removed on drop
pub struct TempFileStorage {
    storage: FileStorage,
    dir: TempDir,
}

impl TempFileStorage {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(storage_path(&dir));
        Self { storage, dir }
    }

    pub fn path(&self) -> PathBuf {
        storage_path(&self.dir)
    }
}

/// Storage file location inside a temporary directory, one level down so
/// parent creation is exercised
pub fn storage_path(dir: &TempDir) -> PathBuf {
    dir.path().join("state").join("filters.json")
}

#[async_trait]
impl StateStorage for TempFileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.storage.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.storage.remove(key).await
    }
}

/// Build a filter map from key/value pairs
pub fn filters(entries: Vec<(&str, FilterValue)>) -> FilterMap {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
