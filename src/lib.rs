//! # list-filter
//!
//! Filter, sort and pagination state for list views.
//!
//! ## Features
//!
//! - **Guarded Apply**: State changes through one entry point; overlapping calls are dropped
//! - **Change Signing**: SHA-256 over a key-order independent flattening suppresses redundant notifications
//! - **URL Codec**: Round-trips state through a query string with type inference for filter values
//! - **Response Parsing**: Picks the echoed filter state and pagination counters out of API responses
//! - **Persistence**: Page size and sort order survive sessions through a pluggable storage backend
//! - **Observable**: Live state over `tokio::sync::watch`, changes over a broadcast bus
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use list_filter::prelude::*;
//!
//! let manager = FilterManager::builder(FilterConfig::with_prefix("orders"))
//!     .on_change(|params, query| println!("GET /orders?{}", query))
//!     .build()
//!     .await?;
//!
//! manager.restore_from_query("page=2&sorts=created_at:desc&status=open,pending").await?;
//! manager.set_filter("customer", "Acme").await?;
//! manager.toggle_sort("amount").await?;
//! ```

pub mod config;
pub mod core;
pub mod manager;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        codec::{decode, encode},
        error::{FilterError, Result},
        events::{ChangeBus, ChangeEnvelope, FilterChange},
        persistence::StateStorage,
        response::{ResponseMeta, ResponseParser},
        signer::{Sha256Signer, Signature, Signer},
        state::{FilterPatch, FilterState, SortOrder, SortSpec},
        value::{FilterMap, FilterValue},
    };

    // === Manager ===
    pub use crate::manager::{ApplyOutcome, ChangeCallback, FilterManager, FilterManagerBuilder};

    // === Storage ===
    pub use crate::storage::{FileStorage, InMemoryStorage};

    // === Config ===
    pub use crate::config::{FilterConfig, FilterDefaults};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
