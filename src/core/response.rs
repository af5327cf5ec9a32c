//! Parsing of list responses returned by an API
//!
//! A list endpoint usually echoes the filters it applied next to the records
//! and pagination counters:
//!
//! ```json
//! {
//!   "data": [{"id": 1}, {"id": 2}],
//!   "page": 2, "limit": 20, "total": 145, "from": 21, "to": 40, "pages": 8,
//!   "sorts": [{"field": "name", "order": "asc"}],
//!   "filters": {"status": "active"}
//! }
//! ```
//!
//! [`ResponseParser::parse`] accumulates such objects and hands back the
//! filter part as a [`FilterPatch`] so the echoed state can be applied.

use crate::core::codec::decode_sorts;
use crate::core::state::{FilterPatch, SortSpec};
use crate::core::value::{FilterValue, prune};
use serde::Serialize;
use serde_json::{Map, Value};

/// Pagination counters and records extracted from a response
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseMeta {
    /// Total number of records (after filters)
    pub total: u64,

    /// Position of the first record on this page
    pub from: u64,

    /// Position of the last record on this page
    pub to: u64,

    /// Total number of pages
    pub pages: u64,

    /// Records of the current page
    pub records: Vec<Value>,

    /// Auxiliary data sent alongside the records
    pub meta: Value,
}

impl ResponseMeta {
    /// Whether a page after `page` exists
    pub fn has_next(&self, page: u32) -> bool {
        u64::from(page) < self.pages
    }

    /// Whether a page before `page` exists
    pub fn has_prev(&self, page: u32) -> bool {
        page > 1
    }

    /// Whether the response held no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Accumulates response objects and extracts the filter state they echo
#[derive(Debug, Clone, Default)]
pub struct ResponseParser {
    accumulated: Map<String, Value>,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a response and return the filter fields it carries
    ///
    /// Anything other than a JSON object clears the accumulated state and
    /// yields an empty patch.
    pub fn parse(&mut self, response: &Value) -> FilterPatch {
        let Some(object) = response.as_object() else {
            tracing::debug!("Non-object response, clearing accumulated response state");
            self.clear();
            return FilterPatch::default();
        };

        for (key, value) in object {
            self.accumulated.insert(key.clone(), value.clone());
        }

        self.patch()
    }

    /// The filter fields of the accumulated state, pruned
    pub fn patch(&self) -> FilterPatch {
        let state = &self.accumulated;
        FilterPatch {
            page: state.get("page").and_then(positive_int),
            limit: state.get("limit").and_then(positive_int),
            search: state
                .get("search")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            sorts: state
                .get("sorts")
                .map(parse_sorts_value)
                .filter(|sorts| !sorts.is_empty()),
            filters: state
                .get("filters")
                .and_then(Value::as_object)
                .map(|object| {
                    prune(
                        object
                            .iter()
                            .map(|(k, v)| (k.clone(), FilterValue::from(v.clone())))
                            .collect(),
                    )
                })
                .filter(|filters| !filters.is_empty()),
        }
    }

    /// Pagination counters and records of the accumulated state
    pub fn meta(&self) -> ResponseMeta {
        let state = &self.accumulated;
        ResponseMeta {
            total: count(state.get("total")),
            from: count(state.get("from")),
            to: count(state.get("to")),
            pages: count(state.get("pages")),
            records: state
                .get("data")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            meta: state.get("meta").cloned().unwrap_or(Value::Null),
        }
    }

    /// The raw accumulated response fields
    pub fn accumulated(&self) -> &Map<String, Value> {
        &self.accumulated
    }

    pub fn clear(&mut self) {
        self.accumulated.clear();
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn positive_int(value: &Value) -> Option<i64> {
    as_int(value).filter(|n| *n > 0)
}

fn count(value: Option<&Value>) -> u64 {
    value
        .and_then(as_int)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

fn parse_sorts_value(value: &Value) -> Vec<SortSpec> {
    match value {
        Value::String(raw) => decode_sorts(raw),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(pair) => SortSpec::parse(pair),
                Value::Object(_) => serde_json::from_value::<SortSpec>(item.clone())
                    .ok()
                    .filter(|sort| !sort.field.is_empty()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_extracts_filter_fields() {
        let mut parser = ResponseParser::new();
        let patch = parser.parse(&json!({
            "data": [{"id": 1}],
            "page": 2,
            "limit": "25",
            "search": "",
            "sorts": [{"field": "name", "order": "asc"}, {"field": "age", "order": "up"}],
            "filters": {"status": "active", "tags": []},
            "unrelated": true
        }));

        assert_eq!(patch.page, Some(2));
        assert_eq!(patch.limit, Some(25));
        assert_eq!(patch.search, None);
        assert_eq!(patch.sorts, Some(vec![SortSpec::asc("name")]));

        let filters = patch.filters.unwrap();
        assert_eq!(filters.len(), 1);
        assert_eq!(filters["status"], FilterValue::from("active"));
    }

    #[test]
    fn test_parse_accepts_sort_strings() {
        let mut parser = ResponseParser::new();
        let patch = parser.parse(&json!({"sorts": "name:asc,age:desc"}));
        assert_eq!(
            patch.sorts,
            Some(vec![SortSpec::asc("name"), SortSpec::desc("age")])
        );

        let patch = parser.parse(&json!({"sorts": ["age:desc"]}));
        assert_eq!(patch.sorts, Some(vec![SortSpec::desc("age")]));
    }

    #[test]
    fn test_parse_is_additive() {
        let mut parser = ResponseParser::new();
        parser.parse(&json!({"page": 3, "total": 100}));
        let patch = parser.parse(&json!({"limit": 10}));

        assert_eq!(patch.page, Some(3));
        assert_eq!(patch.limit, Some(10));
        assert_eq!(parser.meta().total, 100);
    }

    #[test]
    fn test_non_object_clears_state() {
        let mut parser = ResponseParser::new();
        parser.parse(&json!({"page": 3, "data": [1, 2]}));

        let patch = parser.parse(&Value::Null);
        assert!(patch.is_empty());
        assert!(parser.accumulated().is_empty());
        assert_eq!(parser.meta(), ResponseMeta::default());

        parser.parse(&json!({"page": 3}));
        assert!(parser.parse(&json!("not an object")).is_empty());
    }

    #[test]
    fn test_meta() {
        let mut parser = ResponseParser::new();
        parser.parse(&json!({
            "data": [{"id": 1}, {"id": 2}],
            "total": 145, "from": 21, "to": 40, "pages": 8,
            "meta": {"currency": "EUR"}
        }));

        let meta = parser.meta();
        assert_eq!(meta.total, 145);
        assert_eq!(meta.from, 21);
        assert_eq!(meta.to, 40);
        assert_eq!(meta.records.len(), 2);
        assert_eq!(meta.meta["currency"], "EUR");
        assert!(meta.has_next(2));
        assert!(!meta.has_next(8));
        assert!(meta.has_prev(2));
        assert!(!meta.has_prev(1));
    }

    #[test]
    fn test_meta_defaults_invalid_counts() {
        let mut parser = ResponseParser::new();
        parser.parse(&json!({"total": -4, "pages": "x"}));
        let meta = parser.meta();
        assert_eq!(meta.total, 0);
        assert_eq!(meta.pages, 0);
        assert!(meta.is_empty());
    }
}
