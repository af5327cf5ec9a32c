//! Macro-generated test suite for `StateStorage` contract validation.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use list_filter::storage::InMemoryStorage;
//!
//! state_storage_tests!(InMemoryStorage::new());
//! ```
//!
//! # Generated Tests
//!
//! - `test_get_missing`: unknown key reads as None
//! - `test_set_and_get`: written value reads back
//! - `test_overwrite`: second write replaces the first
//! - `test_remove`: removed key reads as None, removing twice is fine
//! - `test_keys_are_independent`: prefixes do not interfere
//! - `test_concurrent_writes`: parallel writes from spawned tasks all land

/// Generate a `StateStorage` conformance test suite.
///
/// `$factory` is re-evaluated for each test to keep tests isolated.
#[macro_export]
macro_rules! state_storage_tests {
    ($factory:expr) => {
        mod state_storage_contract_tests {
            use super::*;
            use list_filter::core::persistence::StateStorage;
            use std::sync::Arc;

            #[tokio::test]
            async fn test_get_missing() {
                let storage = $factory;
                assert_eq!(storage.get("missing.limit").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_set_and_get() {
                let storage = $factory;
                storage.set("orders.limit", "50").await.unwrap();
                assert_eq!(
                    storage.get("orders.limit").await.unwrap().as_deref(),
                    Some("50")
                );
            }

            #[tokio::test]
            async fn test_overwrite() {
                let storage = $factory;
                storage.set("orders.sorts", "name:asc").await.unwrap();
                storage.set("orders.sorts", "age:desc").await.unwrap();
                assert_eq!(
                    storage.get("orders.sorts").await.unwrap().as_deref(),
                    Some("age:desc")
                );
            }

            #[tokio::test]
            async fn test_remove() {
                let storage = $factory;
                storage.set("orders.limit", "10").await.unwrap();
                storage.remove("orders.limit").await.unwrap();
                storage.remove("orders.limit").await.unwrap();
                assert_eq!(storage.get("orders.limit").await.unwrap(), None);
            }

            #[tokio::test]
            async fn test_keys_are_independent() {
                let storage = $factory;
                storage.set("orders.limit", "10").await.unwrap();
                storage.set("users.limit", "25").await.unwrap();
                assert_eq!(
                    storage.get("orders.limit").await.unwrap().as_deref(),
                    Some("10")
                );
                assert_eq!(
                    storage.get("users.limit").await.unwrap().as_deref(),
                    Some("25")
                );
            }

            #[tokio::test]
            async fn test_concurrent_writes() {
                let storage = Arc::new($factory);
                let mut handles = Vec::new();
                for i in 0..8 {
                    let storage = storage.clone();
                    handles.push(tokio::spawn(async move {
                        storage
                            .set(&format!("view{}.limit", i), &i.to_string())
                            .await
                            .unwrap();
                    }));
                }
                for handle in handles {
                    handle.await.unwrap();
                }
                for i in 0..8 {
                    assert_eq!(
                        storage.get(&format!("view{}.limit", i)).await.unwrap(),
                        Some(i.to_string())
                    );
                }
            }
        }
    };
}
