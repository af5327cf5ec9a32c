//! FilterManagerBuilder for fluent construction of filter managers

use super::{ChangeCallback, FilterManager};
use crate::config::FilterConfig;
use crate::core::error::Result;
use crate::core::persistence::StateStorage;
use crate::core::signer::{Sha256Signer, Signer};
use crate::core::state::FilterState;
use crate::storage::InMemoryStorage;
use std::sync::Arc;

/// Builder for [`FilterManager`]
///
/// # Example
///
/// ```ignore
/// let manager = FilterManager::builder(FilterConfig::with_prefix("orders"))
///     .with_storage(FileStorage::new("prefs.json"))
///     .on_change(|params, query| println!("reload with ?{}", query))
///     .build()
///     .await?;
/// ```
pub struct FilterManagerBuilder {
    config: FilterConfig,
    storage: Option<Arc<dyn StateStorage>>,
    signer: Option<Arc<dyn Signer>>,
    callback: Option<ChangeCallback>,
}

impl FilterManagerBuilder {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            storage: None,
            signer: None,
            callback: None,
        }
    }

    /// Set the storage backend (defaults to a private [`InMemoryStorage`])
    pub fn with_storage(mut self, storage: impl StateStorage + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }

    /// Set a storage backend shared with other managers
    pub fn with_shared_storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the signer (defaults to [`Sha256Signer`])
    pub fn with_signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Register the function called with `(params, query)` on every change
    ///
    /// Only one callback is kept; registering again replaces it.
    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FilterState, &str) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Validate the configuration, restore persisted fields and build
    pub async fn build(self) -> Result<FilterManager> {
        self.config.validate()?;

        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryStorage::new()));
        let signer = self.signer.unwrap_or_else(|| Arc::new(Sha256Signer::new()));

        let defaults = self.config.defaults.to_state();
        let initial = super::restore_persisted(&self.config, storage.as_ref(), defaults.clone()).await;

        Ok(FilterManager::from_parts(
            self.config,
            storage,
            signer,
            self.callback,
            defaults,
            initial,
        ))
    }
}
