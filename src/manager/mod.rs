//! Filter state manager
//!
//! [`FilterManager`] owns the filter state of one list view. The state only
//! changes through [`FilterManager::apply`] (and the helpers built on it):
//!
//! ```text
//! apply(patch) ──▶ merge ──▶ sign ──▶ same signature? ──yes──▶ Unchanged
//!                                         │
//!                                         no
//!                                         ▼
//!                  callback(params, query) + ChangeBus + persist limit/sorts
//! ```
//!
//! Calls made while another apply is still running are dropped, not queued.

mod builder;

pub use builder::FilterManagerBuilder;

use crate::config::FilterConfig;
use crate::core::codec;
use crate::core::error::Result;
use crate::core::events::{ChangeBus, ChangeEnvelope, FilterChange};
use crate::core::persistence::{StateStorage, storage_key};
use crate::core::response::{ResponseMeta, ResponseParser};
use crate::core::signer::{Signature, Signer};
use crate::core::state::{FilterPatch, FilterState, SortOrder, SortSpec};
use crate::core::value::FilterValue;
use futures::Stream;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

/// Function called with `(params, query)` whenever the state signature changes
pub type ChangeCallback = Arc<dyn Fn(&FilterState, &str) + Send + Sync>;

/// What an apply call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Another apply was running; nothing happened
    Dropped,
    /// The state signs the same as before; no notification was sent
    Unchanged,
    /// The state changed and listeners were notified
    Changed(Signature),
}

impl ApplyOutcome {
    pub fn is_changed(&self) -> bool {
        matches!(self, ApplyOutcome::Changed(_))
    }
}

/// Holds the apply flag for the duration of one apply
struct ApplyGuard<'a>(&'a AtomicBool);

impl<'a> ApplyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| ApplyGuard(flag))
    }
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Inner {
    config: FilterConfig,
    storage: Arc<dyn StateStorage>,
    signer: Arc<dyn Signer>,
    callback: Option<ChangeCallback>,
    defaults: FilterState,
    applying: AtomicBool,
    state: watch::Sender<FilterState>,
    signature: Mutex<Option<Signature>>,
    parser: Mutex<ResponseParser>,
    bus: ChangeBus,
}

/// Pagination, search, sort and filter state of a list view
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct FilterManager {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Merge persisted limit and sorts into the defaults
///
/// Unreadable or invalid stored values are ignored.
pub(crate) async fn restore_persisted(
    config: &FilterConfig,
    storage: &dyn StateStorage,
    mut state: FilterState,
) -> FilterState {
    let prefix = &config.storage_prefix;

    if config.persist_limit {
        let key = storage_key(prefix, "limit");
        match storage.get(&key).await {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => state.limit = Some(limit),
                _ => tracing::warn!(key = %key, value = %raw, "Ignoring invalid persisted limit"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to read persisted limit"),
        }
    }

    if config.persist_sorts {
        let key = storage_key(prefix, "sorts");
        match storage.get(&key).await {
            Ok(Some(raw)) => {
                let sorts = codec::decode_sorts(&raw);
                if sorts.is_empty() {
                    tracing::warn!(key = %key, value = %raw, "Ignoring invalid persisted sorts");
                } else {
                    state.sorts = sorts;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Failed to read persisted sorts"),
        }
    }

    state
}

impl FilterManager {
    /// Start building a manager
    pub fn builder(config: FilterConfig) -> FilterManagerBuilder {
        FilterManagerBuilder::new(config)
    }

    /// Build a manager with in-memory storage and the SHA-256 signer
    pub async fn new(config: FilterConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    fn from_parts(
        config: FilterConfig,
        storage: Arc<dyn StateStorage>,
        signer: Arc<dyn Signer>,
        callback: Option<ChangeCallback>,
        defaults: FilterState,
        initial: FilterState,
    ) -> Self {
        let (state, _) = watch::channel(initial);
        let bus = ChangeBus::new(config.event_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                storage,
                signer,
                callback,
                defaults,
                applying: AtomicBool::new(false),
                state,
                signature: Mutex::new(None),
                parser: Mutex::new(ResponseParser::new()),
                bus,
            }),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.inner.config
    }

    /// Snapshot of the current state
    pub fn state(&self) -> FilterState {
        self.inner.state.borrow().clone()
    }

    /// Signature of the last state that was announced, if any
    pub fn signature(&self) -> Option<Signature> {
        lock(&self.inner.signature).clone()
    }

    /// The current state as a query string
    pub fn query(&self) -> String {
        codec::encode(&self.inner.state.borrow())
    }

    /// Whether an apply is currently running
    pub fn is_applying(&self) -> bool {
        self.inner.applying.load(Ordering::Acquire)
    }

    /// Follow the live state
    ///
    /// The receiver sees every accepted apply that modified the state, even
    /// when the signature (and so the callback) did not change.
    pub fn subscribe(&self) -> watch::Receiver<FilterState> {
        self.inner.state.subscribe()
    }

    /// Receive announced changes (one per distinct signature)
    pub fn changes(&self) -> broadcast::Receiver<ChangeEnvelope> {
        self.inner.bus.subscribe()
    }

    /// Announced changes as a stream; lagged messages are skipped
    pub fn change_stream(&self) -> impl Stream<Item = ChangeEnvelope> + Send + 'static {
        BroadcastStream::new(self.inner.bus.subscribe()).filter_map(|item| item.ok())
    }

    /// Apply a partial update
    ///
    /// Only usable fields of the patch overwrite the state (see
    /// [`FilterState::merge_patch`]). A signer failure is returned to the
    /// caller; the state has been merged by then but nothing was announced.
    pub async fn apply(&self, patch: FilterPatch) -> Result<ApplyOutcome> {
        self.apply_with(move |state| state.merge_patch(patch)).await
    }

    async fn apply_with<F>(&self, mutate: F) -> Result<ApplyOutcome>
    where
        F: FnOnce(&mut FilterState),
    {
        let Some(_guard) = ApplyGuard::acquire(&self.inner.applying) else {
            tracing::debug!(
                prefix = %self.inner.config.storage_prefix,
                "Apply already in progress, dropping call"
            );
            return Ok(ApplyOutcome::Dropped);
        };

        let mut next = self.state();
        mutate(&mut next);
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        let signature = self.inner.signer.sign_state(&next).await?;

        {
            let mut stored = lock(&self.inner.signature);
            if stored.as_ref() == Some(&signature) {
                tracing::debug!(signature = %signature, "State unchanged, skipping notification");
                return Ok(ApplyOutcome::Unchanged);
            }
            *stored = Some(signature.clone());
        }

        let query = codec::encode(&next);
        tracing::debug!(signature = %signature, query = %query, "Filter state changed");

        if let Some(callback) = &self.inner.callback {
            callback(&next, &query);
        }

        self.inner.bus.publish(FilterChange {
            params: next.clone(),
            query,
            signature: signature.clone(),
        });

        self.persist(&next).await;

        Ok(ApplyOutcome::Changed(signature))
    }

    async fn persist(&self, state: &FilterState) {
        let config = &self.inner.config;
        let storage = &self.inner.storage;

        if config.persist_limit {
            if let Some(limit) = state.limit {
                let key = storage_key(&config.storage_prefix, "limit");
                if let Err(e) = storage.set(&key, &limit.to_string()).await {
                    tracing::warn!(key = %key, error = %e, "Failed to persist limit");
                }
            }
        }

        if config.persist_sorts {
            let key = storage_key(&config.storage_prefix, "sorts");
            let result = if state.sorts.is_empty() {
                storage.remove(&key).await
            } else {
                storage.set(&key, &codec::encode_sorts(&state.sorts)).await
            };
            if let Err(e) = result {
                tracing::warn!(key = %key, error = %e, "Failed to persist sorts");
            }
        }
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    pub async fn set_page(&self, page: u32) -> Result<ApplyOutcome> {
        self.apply(FilterPatch::new().page(i64::from(page))).await
    }

    pub async fn next_page(&self) -> Result<ApplyOutcome> {
        let page = self.state().page.unwrap_or(1);
        self.set_page(page.saturating_add(1)).await
    }

    /// Go one page back, never below the first page
    pub async fn prev_page(&self) -> Result<ApplyOutcome> {
        let page = self.state().page.unwrap_or(1);
        self.set_page(page.saturating_sub(1).max(1)).await
    }

    /// Change the page size and return to the first page
    pub async fn set_limit(&self, limit: u32) -> Result<ApplyOutcome> {
        self.apply(FilterPatch::new().page(1).limit(i64::from(limit)))
            .await
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Change the search text and return to the first page
    ///
    /// An empty string leaves the search untouched; use
    /// [`FilterManager::clear_search`] to remove it.
    pub async fn set_search(&self, search: impl Into<String>) -> Result<ApplyOutcome> {
        self.apply(FilterPatch::new().page(1).search(search)).await
    }

    pub async fn clear_search(&self) -> Result<ApplyOutcome> {
        self.apply_with(|state| {
            state.search = None;
            state.page = Some(1);
        })
        .await
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    pub async fn set_sorts(&self, sorts: Vec<SortSpec>) -> Result<ApplyOutcome> {
        self.apply(FilterPatch::new().sorts(sorts)).await
    }

    /// Cycle the primary sort of a field: ascending, descending, removed
    ///
    /// A field that is not the primary sort becomes the primary sort,
    /// ascending. Other sorts keep their relative order.
    pub async fn toggle_sort(&self, field: &str) -> Result<ApplyOutcome> {
        let field = field.to_string();
        self.apply_with(move |state| {
            let primary = state
                .primary_sort()
                .filter(|sort| sort.field == field)
                .map(|sort| sort.order);
            state.sorts.retain(|sort| sort.field != field);
            match primary {
                None => state.sorts.insert(0, SortSpec::asc(field)),
                Some(SortOrder::Asc) => state.sorts.insert(0, SortSpec::desc(field)),
                Some(SortOrder::Desc) => {}
            }
        })
        .await
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// Set one filter, keeping the others, and return to the first page
    pub async fn set_filter(
        &self,
        key: impl Into<String>,
        value: impl Into<FilterValue>,
    ) -> Result<ApplyOutcome> {
        let mut filters = self.state().filters;
        filters.insert(key.into(), value.into());
        self.apply(FilterPatch::new().page(1).filters(filters)).await
    }

    /// Remove one filter, keeping the others, and return to the first page
    pub async fn remove_filter(&self, key: &str) -> Result<ApplyOutcome> {
        let mut filters = self.state().filters;
        filters.shift_remove(key);
        self.apply(FilterPatch::new().page(1).filters(filters)).await
    }

    /// Return to the configured defaults
    pub async fn reset(&self) -> Result<ApplyOutcome> {
        let defaults = self.inner.defaults.clone();
        self.apply_with(move |state| *state = defaults).await
    }

    // =========================================================================
    // URL and response synchronisation
    // =========================================================================

    /// Apply the state carried by a query string
    ///
    /// Filters are replaced by the ones in the query; reserved fields missing
    /// from the query keep their current values.
    pub async fn restore_from_query(&self, query: &str) -> Result<ApplyOutcome> {
        self.apply(codec::decode(query).into()).await
    }

    /// Feed an API response to the response parser
    pub fn parse_response(&self, response: &Value) -> FilterPatch {
        lock(&self.inner.parser).parse(response)
    }

    /// Pagination counters and records of the responses parsed so far
    pub fn response_meta(&self) -> ResponseMeta {
        lock(&self.inner.parser).meta()
    }

    /// Parse a response and apply the filter state it echoes
    pub async fn ingest_response(&self, response: &Value) -> Result<ApplyOutcome> {
        let patch = self.parse_response(response);
        self.apply(patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    async fn manager_with_counter() -> (FilterManager, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let manager = FilterManager::builder(FilterConfig::with_prefix("test"))
            .on_change(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .await
            .unwrap();
        (manager, calls)
    }

    #[tokio::test]
    async fn test_initial_state_uses_defaults() {
        let manager = FilterManager::new(FilterConfig::default()).await.unwrap();
        let state = manager.state();
        assert_eq!(state.page, Some(1));
        assert_eq!(state.limit, Some(20));
        assert!(manager.signature().is_none());
        assert_eq!(manager.query(), "page=1&limit=20");
    }

    #[tokio::test]
    async fn test_empty_apply_notifies_once() {
        let (manager, calls) = manager_with_counter().await;

        assert!(manager.apply(FilterPatch::new()).await.unwrap().is_changed());
        assert_eq!(
            manager.apply(FilterPatch::new()).await.unwrap(),
            ApplyOutcome::Unchanged
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_apply_guard_drops_reentrant_calls() {
        let (manager, _) = manager_with_counter().await;
        let _guard = ApplyGuard::acquire(&manager.inner.applying).unwrap();

        assert!(manager.is_applying());
        assert_eq!(
            manager.set_page(5).await.unwrap(),
            ApplyOutcome::Dropped
        );
        assert_eq!(manager.state().page, Some(1));
    }

    #[tokio::test]
    async fn test_guard_released_after_apply() {
        let (manager, _) = manager_with_counter().await;
        manager.set_page(2).await.unwrap();
        assert!(!manager.is_applying());
        assert!(manager.set_page(3).await.unwrap().is_changed());
    }

    #[tokio::test]
    async fn test_toggle_sort_cycles() {
        let (manager, _) = manager_with_counter().await;
        manager.set_sorts(vec![SortSpec::desc("age")]).await.unwrap();

        manager.toggle_sort("name").await.unwrap();
        assert_eq!(
            manager.state().sorts,
            vec![SortSpec::asc("name"), SortSpec::desc("age")]
        );

        manager.toggle_sort("name").await.unwrap();
        assert_eq!(manager.state().primary_sort(), Some(&SortSpec::desc("name")));

        manager.toggle_sort("name").await.unwrap();
        assert_eq!(manager.state().sorts, vec![SortSpec::desc("age")]);
    }

    #[tokio::test]
    async fn test_prev_page_stops_at_first_page() {
        let (manager, _) = manager_with_counter().await;
        manager.next_page().await.unwrap();
        assert_eq!(manager.state().page, Some(2));
        manager.prev_page().await.unwrap();
        manager.prev_page().await.unwrap();
        assert_eq!(manager.state().page, Some(1));
    }

    #[tokio::test]
    async fn test_filters_and_search_helpers() {
        let (manager, _) = manager_with_counter().await;
        manager.set_page(4).await.unwrap();
        manager.set_filter("status", "open").await.unwrap();
        manager.set_filter("tags", vec!["a", "b"]).await.unwrap();
        assert_eq!(manager.state().page, Some(1));
        assert_eq!(manager.state().filters.len(), 2);

        manager.remove_filter("status").await.unwrap();
        let keys: Vec<String> = manager.state().filters.keys().cloned().collect();
        assert_eq!(keys, vec!["tags".to_string()]);

        manager.set_search("acme").await.unwrap();
        assert_eq!(manager.state().search.as_deref(), Some("acme"));
        manager.clear_search().await.unwrap();
        assert_eq!(manager.state().search, None);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let (manager, _) = manager_with_counter().await;
        manager.set_search("x").await.unwrap();
        manager.set_filter("status", "open").await.unwrap();
        manager.reset().await.unwrap();
        assert_eq!(manager.state(), FilterConfig::default().defaults.to_state());
    }

    #[tokio::test]
    async fn test_persists_limit_and_sorts() {
        let storage = InMemoryStorage::new();
        let manager = FilterManager::builder(FilterConfig::with_prefix("orders"))
            .with_storage(storage.clone())
            .build()
            .await
            .unwrap();

        manager
            .apply(
                FilterPatch::new()
                    .limit(50)
                    .sorts(vec![SortSpec::desc("created_at")]),
            )
            .await
            .unwrap();

        assert_eq!(
            storage.get("orders.limit").await.unwrap().as_deref(),
            Some("50")
        );
        assert_eq!(
            storage.get("orders.sorts").await.unwrap().as_deref(),
            Some("created_at:desc")
        );
    }

    #[tokio::test]
    async fn test_ingest_response() {
        let (manager, _) = manager_with_counter().await;
        let outcome = manager
            .ingest_response(&json!({"page": 3, "total": 90, "pages": 5, "data": []}))
            .await
            .unwrap();

        assert!(outcome.is_changed());
        assert_eq!(manager.state().page, Some(3));
        assert_eq!(manager.response_meta().total, 90);
    }
}
