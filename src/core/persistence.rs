//! Storage trait for persisted filter preferences

use crate::core::error::Result;
use async_trait::async_trait;

/// Key-value storage for the fields a filter manager persists
///
/// Implementations provide durable (or, for tests, in-memory) string storage.
/// Keys are namespaced by the caller, e.g. `orders.limit`.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read a value, `None` when the key was never written
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a value; removing a missing key is not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Build a namespaced storage key
pub fn storage_key(prefix: &str, field: &str) -> String {
    format!("{}.{}", prefix, field)
}
