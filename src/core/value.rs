//! Filter values and type inference for query-string tokens

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Token used for an explicit null, in query strings and in signatures
pub const NULL_TOKEN: &str = "[null]";

/// Filters keyed by name, in insertion order
pub type FilterMap = IndexMap<String, FilterValue>;

/// A filter value with its shape made explicit
///
/// Query strings carry no schema, so the shape of a value is inferred when it
/// is decoded (see [`FilterValue::infer`]) and written back from the variant
/// when it is encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FilterValue>),
    Map(FilterMap),
}

impl FilterValue {
    /// Infer a scalar value from a decoded token
    ///
    /// `"true"`/`"false"` become booleans, `"[null]"` becomes null, numeric
    /// looking tokens become numbers and everything else stays a string.
    pub fn infer(token: &str) -> Self {
        match token {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            NULL_TOKEN => FilterValue::Null,
            _ if is_numeric(token) => token
                .parse::<f64>()
                .map(FilterValue::Number)
                .unwrap_or_else(|_| FilterValue::String(token.to_string())),
            _ => FilterValue::String(token.to_string()),
        }
    }

    /// Render a scalar as the token [`FilterValue::infer`] reads back
    ///
    /// Returns `None` for arrays and maps.
    pub fn to_token(&self) -> Option<String> {
        match self {
            FilterValue::Null => Some(NULL_TOKEN.to_string()),
            FilterValue::Bool(b) => Some(b.to_string()),
            FilterValue::Number(n) => Some(format_number(*n)),
            FilterValue::String(s) => Some(s.clone()),
            FilterValue::Array(_) | FilterValue::Map(_) => None,
        }
    }

    /// Whether this is a scalar (not an array or a map)
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FilterValue::Array(_) | FilterValue::Map(_))
    }

    /// Empty strings, arrays and maps count as empty; null does not
    pub fn is_empty(&self) -> bool {
        match self {
            FilterValue::String(s) => s.is_empty(),
            FilterValue::Array(items) => items.is_empty(),
            FilterValue::Map(map) => map.is_empty(),
            FilterValue::Null | FilterValue::Bool(_) | FilterValue::Number(_) => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Drop empty children, then report whether anything is left
    fn pruned(self) -> Option<Self> {
        let value = match self {
            FilterValue::Array(items) => {
                FilterValue::Array(items.into_iter().filter_map(Self::pruned).collect())
            }
            FilterValue::Map(map) => FilterValue::Map(prune(map)),
            other => other,
        };
        (!value.is_empty()).then_some(value)
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_token() {
            Some(token) => f.write_str(&token),
            None => write!(f, "{}", Value::from(self.clone())),
        }
    }
}

/// Remove empty strings, arrays and maps, recursively
///
/// A compound value that only held empty values is removed as well.
pub fn prune(filters: FilterMap) -> FilterMap {
    filters
        .into_iter()
        .filter_map(|(key, value)| value.pruned().map(|v| (key, v)))
        .collect()
}

fn is_numeric(token: &str) -> bool {
    static NUMBER_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = NUMBER_REGEX
        .get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?([eE][-+]?\d+)?$").unwrap());
    regex.is_match(token)
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<Value> for FilterValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FilterValue::Null,
            Value::Bool(b) => FilterValue::Bool(b),
            Value::Number(n) => n
                .as_f64()
                .map(FilterValue::Number)
                .unwrap_or(FilterValue::Null),
            Value::String(s) => FilterValue::String(s),
            Value::Array(items) => {
                FilterValue::Array(items.into_iter().map(FilterValue::from).collect())
            }
            Value::Object(map) => FilterValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, FilterValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<FilterValue> for Value {
    fn from(value: FilterValue) -> Self {
        match value {
            FilterValue::Null => Value::Null,
            FilterValue::Bool(b) => Value::Bool(b),
            FilterValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    Value::from(n as i64)
                } else {
                    serde_json::Number::from_f64(n)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            FilterValue::String(s) => Value::String(s),
            FilterValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            FilterValue::Map(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::String(s)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::Number(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        FilterValue::Number(f64::from(n))
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Number(n as f64)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(items: Vec<T>) -> Self {
        FilterValue::Array(items.into_iter().map(Into::into).collect())
    }
}
