//! Configuration loading and management

use crate::core::error::ConfigError;
use crate::core::state::{FilterState, SortSpec};
use crate::core::value::{FilterMap, prune};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Initial values for a filter manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    /// Page number (starts at 1)
    pub page: u32,

    /// Number of items per page
    pub limit: u32,

    /// Initial search text
    pub search: Option<String>,

    /// Initial sort criteria
    pub sorts: Vec<SortSpec>,

    /// Initial filters
    pub filters: FilterMap,
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
            sorts: Vec::new(),
            filters: FilterMap::new(),
        }
    }
}

impl FilterDefaults {
    /// The state these defaults describe
    pub fn to_state(&self) -> FilterState {
        FilterState {
            page: Some(self.page).filter(|p| *p > 0),
            limit: Some(self.limit).filter(|l| *l > 0),
            search: self.search.clone().filter(|s| !s.is_empty()),
            sorts: self.sorts.clone(),
            filters: prune(self.filters.clone()),
        }
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

fn default_prefix() -> String {
    "filter".to_string()
}

fn default_event_capacity() -> usize {
    64
}

/// Configuration for a filter manager
///
/// # Example
/// ```yaml
/// storage_prefix: orders
/// persist_limit: true
/// persist_sorts: false
/// defaults:
///   limit: 50
///   sorts:
///     - field: created_at
///       order: desc
///   filters:
///     status: [open, pending]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Namespace for persisted keys (`<prefix>.limit`, `<prefix>.sorts`)
    pub storage_prefix: String,

    /// Persist the page size across sessions
    pub persist_limit: bool,

    /// Persist the sort order across sessions
    pub persist_sorts: bool,

    /// Initial state
    pub defaults: FilterDefaults,

    /// Buffer size of the change broadcast channel
    pub event_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            storage_prefix: default_prefix(),
            persist_limit: true,
            persist_sorts: true,
            defaults: FilterDefaults::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl FilterConfig {
    /// Default configuration under the given storage prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            storage_prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_prefix.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "storage_prefix".to_string(),
            });
        }
        if self.defaults.page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "defaults.page".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.defaults.limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "defaults.limit".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "event_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
