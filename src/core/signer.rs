//! Content signatures for change detection
//!
//! A value is flattened into `path:value` lines, the lines are sorted,
//! escaped and joined, and the result is hashed with SHA-256. Sorting makes the signature
//! independent of key insertion order, so two maps holding the same entries
//! always sign the same.
//!
//! ```text
//! {"page": 2, "filters": {"color": ["red", "blue"]}}
//!
//!   filters.color:blue
//!   filters.color:red        ──▶ join("|") ──▶ sha256 ──▶ lowercase hex
//!   page:2
//! ```
//!
//! `\` and `|` inside a line are backslash-escaped before joining, so a value
//! containing the separator cannot pose as two lines.

use crate::core::error::{Result, SignatureError};
use crate::core::state::{FilterState, format_sorts};
use crate::core::value::{FilterValue, NULL_TOKEN};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// Token used for a field that is not set at all
pub const UNDEFINED_TOKEN: &str = "[undefined]";

const LINE_SEPARATOR: &str = "|";

/// Hex-encoded digest of a flattened value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Signature {
    fn from(hex: String) -> Self {
        Signature(hex)
    }
}

/// Flatten a value into sorted `path:value` lines
pub fn flatten(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    flatten_into("", Some(value), &mut lines);
    lines.sort();
    lines
}

/// Flatten named fields, where `None` marks a field that is not set
pub fn flatten_fields(fields: &[(&str, Option<Value>)]) -> Vec<String> {
    let mut lines = Vec::new();
    for (name, value) in fields {
        flatten_into(name, value.as_ref(), &mut lines);
    }
    lines.sort();
    lines
}

fn flatten_into(path: &str, value: Option<&Value>, lines: &mut Vec<String>) {
    let Some(value) = value else {
        lines.push(format!("{}:{}", path, UNDEFINED_TOKEN));
        return;
    };

    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(path, Some(item), lines);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                flatten_into(&child_path, Some(child), lines);
            }
        }
        Value::Null => lines.push(format!("{}:{}", path, NULL_TOKEN)),
        Value::String(s) => lines.push(format!("{}:{}", path, s)),
        Value::Bool(b) => lines.push(format!("{}:{}", path, b)),
        Value::Number(n) => lines.push(format!("{}:{}", path, n)),
    }
}

/// Join flattened lines into the string that gets hashed
pub fn canonical(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| line.replace('\\', "\\\\").replace('|', "\\|"))
        .collect::<Vec<_>>()
        .join(LINE_SEPARATOR)
}

/// SHA-256 of a string, as lowercase hex
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

/// The fields a [`FilterState`] is signed over
///
/// Sorts are signed in their `field:order,...` form because their order is
/// significant and flattening would lose it.
pub fn state_fields(state: &FilterState) -> Vec<(&'static str, Option<Value>)> {
    let filters = Value::from(FilterValue::Map(state.filters.clone()));
    vec![
        ("page", state.page.map(Value::from)),
        ("limit", state.limit.map(Value::from)),
        ("search", state.search.clone().map(Value::String)),
        (
            "sorts",
            (!state.sorts.is_empty()).then(|| Value::String(format_sorts(&state.sorts))),
        ),
        ("filters", Some(filters)),
    ]
}

/// Computes and checks signatures
///
/// Implementors only provide [`Signer::digest`]; flattening is shared.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Digest the canonical (flattened and joined) form of a value
    async fn digest(&self, canonical: String) -> Result<Signature>;

    /// Sign an arbitrary JSON value
    async fn sign(&self, data: &Value) -> Result<Signature> {
        self.digest(canonical(&flatten(data))).await
    }

    /// Sign a list of named, possibly unset, fields
    async fn sign_fields(&self, fields: &[(&str, Option<Value>)]) -> Result<Signature> {
        self.digest(canonical(&flatten_fields(fields))).await
    }

    /// Sign the parameter projection of a filter state
    async fn sign_state(&self, state: &FilterState) -> Result<Signature> {
        self.sign_fields(&state_fields(state)).await
    }

    /// Check a value against a signature
    async fn validate(&self, data: &Value, signature: &Signature) -> Result<bool> {
        Ok(&self.sign(data).await? == signature)
    }
}

/// SHA-256 signer
///
/// Hashing runs on the blocking thread pool, so a Tokio runtime is required.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Signer;

impl Sha256Signer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signer for Sha256Signer {
    async fn digest(&self, canonical: String) -> Result<Signature> {
        let hex = tokio::task::spawn_blocking(move || sha256_hex(&canonical))
            .await
            .map_err(|e| SignatureError::Digest {
                message: e.to_string(),
            })?;
        Ok(Signature(hex))
    }
}
