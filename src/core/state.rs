//! Filter state, sort specifications and partial updates

use crate::core::value::{FilterMap, prune};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// The opposite direction
    pub fn reversed(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            _ => Err(()),
        }
    }
}

/// One sort criterion
///
/// # Format
/// - `field:asc`
/// - `field:desc`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }

    /// Parse a `field:order` pair
    ///
    /// Returns `None` when the field is empty or the order is neither `asc`
    /// nor `desc`.
    pub fn parse(pair: &str) -> Option<Self> {
        let (field, order) = pair.split_once(':')?;
        if field.is_empty() {
            return None;
        }
        Some(Self::new(field, order.parse().ok()?))
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.order)
    }
}

/// Parse a comma-joined list of `field:order` pairs, dropping invalid ones
pub fn parse_sorts(raw: &str) -> Vec<SortSpec> {
    raw.split(',').filter_map(SortSpec::parse).collect()
}

/// Render sorts as a comma-joined list of `field:order` pairs
pub fn format_sorts(sorts: &[SortSpec]) -> String {
    sorts
        .iter()
        .map(SortSpec::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Pagination, search, sorting and filters for a list view
///
/// This is also the parameter object handed to change callbacks.
///
/// Invariants:
/// - `page` and `limit` are greater than zero when set
/// - `search` is non-empty when set
/// - `filters` holds no empty strings, arrays or maps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterState {
    /// Page number (starts at 1)
    pub page: Option<u32>,

    /// Number of items per page
    pub limit: Option<u32>,

    /// Free-text search
    pub search: Option<String>,

    /// Sort criteria, primary sort first
    #[serde(default)]
    pub sorts: Vec<SortSpec>,

    /// Free-form filters
    #[serde(default)]
    pub filters: FilterMap,
}

impl FilterState {
    /// The first sort criterion, if any
    pub fn primary_sort(&self) -> Option<&SortSpec> {
        self.sorts.first()
    }

    /// Overwrite the fields the patch carries usable values for
    ///
    /// Each field is replaced or kept on its own:
    /// - page and limit only when positive
    /// - search only when non-empty
    /// - sorts only when non-empty
    /// - filters whenever present, then pruned of empty values
    pub fn merge_patch(&mut self, patch: FilterPatch) {
        if let Some(page) = patch.page.and_then(positive_u32) {
            self.page = Some(page);
        }
        if let Some(limit) = patch.limit.and_then(positive_u32) {
            self.limit = Some(limit);
        }
        if let Some(search) = patch.search.filter(|s| !s.is_empty()) {
            self.search = Some(search);
        }
        if let Some(sorts) = patch.sorts.filter(|s| !s.is_empty()) {
            self.sorts = sorts;
        }
        if let Some(filters) = patch.filters {
            self.filters = prune(filters);
        }
    }

    /// A patch that sets every field of this state
    pub fn to_patch(&self) -> FilterPatch {
        self.clone().into()
    }
}

fn positive_u32(n: i64) -> Option<u32> {
    u32::try_from(n).ok().filter(|n| *n > 0)
}

/// A partial update for [`FilterState`]
///
/// Every field is optional. Page and limit are signed so that zero or
/// negative input can be passed through and ignored by
/// [`FilterState::merge_patch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPatch {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub sorts: Option<Vec<SortSpec>>,
    pub filters: Option<FilterMap>,
}

impl FilterPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn sorts(mut self, sorts: Vec<SortSpec>) -> Self {
        self.sorts = Some(sorts);
        self
    }

    pub fn filters(mut self, filters: FilterMap) -> Self {
        self.filters = Some(filters);
        self
    }

    /// Whether the patch carries no field at all
    pub fn is_empty(&self) -> bool {
        self.page.is_none()
            && self.limit.is_none()
            && self.search.is_none()
            && self.sorts.is_none()
            && self.filters.is_none()
    }
}

impl From<FilterState> for FilterPatch {
    fn from(state: FilterState) -> Self {
        FilterPatch {
            page: state.page.map(i64::from),
            limit: state.limit.map(i64::from),
            search: state.search,
            sorts: Some(state.sorts),
            filters: Some(state.filters),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::FilterValue;

    fn filters(entries: &[(&str, FilterValue)]) -> FilterMap {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_sort_spec_parse() {
        assert_eq!(SortSpec::parse("name:asc"), Some(SortSpec::asc("name")));
        assert_eq!(SortSpec::parse("age:desc"), Some(SortSpec::desc("age")));
        assert_eq!(SortSpec::parse("age:up"), None);
        assert_eq!(SortSpec::parse(":asc"), None);
        assert_eq!(SortSpec::parse("age"), None);
    }

    #[test]
    fn test_parse_sorts_drops_invalid_pairs() {
        let sorts = parse_sorts("name:asc,bogus,age:sideways,age:desc");
        assert_eq!(sorts, vec![SortSpec::asc("name"), SortSpec::desc("age")]);
        assert_eq!(format_sorts(&sorts), "name:asc,age:desc");
    }

    #[test]
    fn test_merge_patch_ignores_non_positive_numbers() {
        let mut state = FilterState {
            page: Some(3),
            limit: Some(20),
            ..Default::default()
        };
        state.merge_patch(FilterPatch::new().page(0).limit(-5));
        assert_eq!(state.page, Some(3));
        assert_eq!(state.limit, Some(20));

        state.merge_patch(FilterPatch::new().page(4));
        assert_eq!(state.page, Some(4));
    }

    #[test]
    fn test_merge_patch_keeps_sorts_and_search_when_empty() {
        let mut state = FilterState {
            search: Some("acme".to_string()),
            sorts: vec![SortSpec::asc("name")],
            ..Default::default()
        };
        state.merge_patch(FilterPatch::new().search("").sorts(vec![]));
        assert_eq!(state.search.as_deref(), Some("acme"));
        assert_eq!(state.primary_sort(), Some(&SortSpec::asc("name")));
    }

    #[test]
    fn test_merge_patch_replaces_filters_wholesale() {
        let mut state = FilterState {
            filters: filters(&[("color", "red".into()), ("size", "xl".into())]),
            ..Default::default()
        };
        state.merge_patch(
            FilterPatch::new().filters(filters(&[
                ("color", "blue".into()),
                ("tags", FilterValue::Array(vec![])),
            ])),
        );
        assert_eq!(state.filters, filters(&[("color", "blue".into())]));
    }

    #[test]
    fn test_patch_from_state_restores_state() {
        let original = FilterState {
            page: Some(2),
            limit: Some(50),
            search: Some("x".to_string()),
            sorts: vec![SortSpec::desc("created_at")],
            filters: filters(&[("active", true.into())]),
        };
        let mut state = FilterState::default();
        state.merge_patch(original.to_patch());
        assert_eq!(state, original);
    }

    #[test]
    fn test_sort_order_serde() {
        let json = serde_json::to_value(SortSpec::desc("age")).unwrap();
        assert_eq!(json, serde_json::json!({"field": "age", "order": "desc"}));
    }
}
