//! Typed error handling for list-filter
//!
//! Almost every input to this crate is coerced rather than rejected: invalid
//! page numbers are ignored, unparseable sort tokens are dropped and
//! non-object responses reset the parser. The errors below cover what is left.
//!
//! # Error Categories
//!
//! - [`SignatureError`]: the digest computation failed
//! - [`StorageError`]: a storage backend could not read or write
//! - [`ConfigError`]: a configuration value is unusable
//!
//! # Example
//!
//! ```rust,ignore
//! match manager.apply(patch).await {
//!     Ok(ApplyOutcome::Changed(signature)) => println!("new state {}", signature),
//!     Ok(_) => {}
//!     Err(FilterError::Signature(e)) => eprintln!("could not sign state: {}", e),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use thiserror::Error;

/// Result alias used across the crate
pub type Result<T, E = FilterError> = std::result::Result<T, E>;

/// The main error type for list-filter
#[derive(Debug, Error)]
pub enum FilterError {
    /// Signing errors
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// Storage backend errors
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FilterError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            FilterError::Signature(e) => e.error_code(),
            FilterError::Storage(e) => e.error_code(),
            FilterError::Config(e) => e.error_code(),
        }
    }
}

// =============================================================================
// Signature Errors
// =============================================================================

/// Errors raised while computing a state signature
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The digest task did not complete
    #[error("Digest computation failed: {message}")]
    Digest { message: String },
}

impl SignatureError {
    pub fn error_code(&self) -> &'static str {
        match self {
            SignatureError::Digest { .. } => "SIGNATURE_DIGEST_ERROR",
        }
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing medium failed
    #[error("Storage I/O error for '{key}': {message}")]
    Io { key: String, message: String },

    /// Stored data could not be decoded or encoded
    #[error("Storage serialization error: {message}")]
    Serialization { message: String },

    /// A lock guarding the storage was poisoned
    #[error("Storage lock poisoned: {message}")]
    Lock { message: String },
}

impl StorageError {
    pub fn error_code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "STORAGE_IO_ERROR",
            StorageError::Serialization { .. } => "STORAGE_SERIALIZATION_ERROR",
            StorageError::Lock { .. } => "STORAGE_LOCK_ERROR",
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization {
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value is missing or empty
    #[error("Missing configuration value: {field}")]
    Missing { field: String },

    /// A value is present but out of range
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::Missing { .. } => "CONFIG_MISSING",
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE",
        }
    }
}
