//! Query-string encoding of filter state
//!
//! # Format
//!
//! ```text
//! page=2&limit=10&search=acme&sorts=name:asc,age:desc&color=red,blue&size=min:1,max:5
//! ```
//!
//! - `page`, `limit`, `search` and `sorts` are reserved keys
//! - any other key is a filter: `a,b` is an array, `k:v,k2:v2` is a map, anything
//!   else a scalar
//! - tokens are percent-encoded one by one, so `,` and `:` inside an array or
//!   map token never clash with the separators
//! - a value with no literal separator is decoded first and then split, which
//!   reads form-encoded queries (`sorts=name%3Aasc%2Cage%3Adesc`); a plain
//!   string holding `,` or `:` therefore comes back as an array or map
//! - a one-element array is written with a trailing comma (`color=red,`)

use crate::core::state::{FilterState, SortOrder, SortSpec};
use crate::core::value::{FilterMap, FilterValue, prune};
use std::borrow::Cow;

/// Keys handled outside the generic filter loop
pub const RESERVED_KEYS: [&str; 4] = ["page", "limit", "search", "sorts"];

/// Encode a filter state as a query string (without a leading `?`)
pub fn encode(state: &FilterState) -> String {
    let mut pairs: Vec<String> = Vec::new();

    if let Some(page) = state.page.filter(|p| *p > 0) {
        pairs.push(format!("page={}", page));
    }
    if let Some(limit) = state.limit.filter(|l| *l > 0) {
        pairs.push(format!("limit={}", limit));
    }
    if let Some(search) = state.search.as_deref().filter(|s| !s.is_empty()) {
        pairs.push(format!("search={}", urlencoding::encode(search)));
    }
    if !state.sorts.is_empty() {
        pairs.push(format!("sorts={}", encode_sorts(&state.sorts)));
    }

    for (key, value) in &state.filters {
        if RESERVED_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Filter key collides with a reserved query key, skipping");
            continue;
        }
        if let Some(encoded) = encode_value(key, value) {
            pairs.push(format!("{}={}", urlencoding::encode(key), encoded));
        }
    }

    pairs.join("&")
}

fn encode_value(key: &str, value: &FilterValue) -> Option<String> {
    match value {
        FilterValue::Array(items) => {
            let tokens: Vec<String> = items
                .iter()
                .filter_map(|item| scalar_token(key, item))
                .collect();
            match tokens.len() {
                0 => None,
                1 => Some(format!("{},", tokens[0])),
                _ => Some(tokens.join(",")),
            }
        }
        FilterValue::Map(map) => {
            let entries: Vec<String> = map
                .iter()
                .filter_map(|(k, v)| {
                    scalar_token(key, v).map(|token| format!("{}:{}", urlencoding::encode(k), token))
                })
                .collect();
            (!entries.is_empty()).then(|| entries.join(","))
        }
        scalar if scalar.is_empty() => None,
        scalar => scalar_token(key, scalar),
    }
}

fn scalar_token(key: &str, value: &FilterValue) -> Option<String> {
    match value.to_token() {
        Some(token) => Some(urlencoding::encode(&token).into_owned()),
        None => {
            tracing::debug!(key = %key, "Nested compound filter value cannot be encoded, skipping");
            None
        }
    }
}

/// Decode a query string into a filter state
///
/// Invalid pieces are dropped rather than reported: non-positive page or
/// limit, empty search, sort pairs with an unknown order.
pub fn decode(query: &str) -> FilterState {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut state = FilterState::default();
    let mut filters = FilterMap::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(raw_key);

        match key.as_str() {
            "page" => state.page = parse_positive(&decode_component(raw_value)),
            "limit" => state.limit = parse_positive(&decode_component(raw_value)),
            "search" => {
                let search = decode_component(raw_value);
                state.search = (!search.is_empty()).then_some(search);
            }
            "sorts" => state.sorts = decode_sorts(raw_value),
            _ => {
                filters.insert(key, decode_value(raw_value));
            }
        }
    }

    state.filters = prune(filters);
    state
}

/// Encode a sort list as comma-joined `field:order` pairs
///
/// This is the `sorts` query value, and also the form sorts are persisted in.
pub fn encode_sorts(sorts: &[SortSpec]) -> String {
    sorts
        .iter()
        .map(|sort| format!("{}:{}", urlencoding::encode(&sort.field), sort.order))
        .collect::<Vec<_>>()
        .join(",")
}

/// Decode a sort list, dropping pairs with an empty field or unknown order
pub fn decode_sorts(raw: &str) -> Vec<SortSpec> {
    match escaped_separators(raw) {
        Some(decoded) => split_sorts(&decoded, |token| token.to_owned()),
        None => split_sorts(raw, decode_component),
    }
}

fn split_sorts(raw: &str, component: fn(&str) -> String) -> Vec<SortSpec> {
    raw.split(',')
        .filter_map(|pair| {
            let (field, order) = pair.split_once(':')?;
            let field = component(field);
            if field.is_empty() {
                return None;
            }
            let order: SortOrder = component(order).parse().ok()?;
            Some(SortSpec::new(field, order))
        })
        .collect()
}

fn decode_value(raw: &str) -> FilterValue {
    match escaped_separators(raw) {
        Some(decoded) => split_value(&decoded, |token| token.to_owned()),
        None => split_value(raw, decode_component),
    }
}

fn split_value(raw: &str, component: fn(&str) -> String) -> FilterValue {
    if raw.contains(':') {
        let map = raw
            .split(',')
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (k, v) = entry.split_once(':').unwrap_or((entry, ""));
                (component(k), FilterValue::infer(&component(v)))
            })
            .collect();
        FilterValue::Map(map)
    } else if raw.contains(',') {
        FilterValue::Array(
            raw.split(',')
                .filter(|token| !token.is_empty())
                .map(|token| FilterValue::infer(&component(token)))
                .collect(),
        )
    } else {
        FilterValue::infer(&component(raw))
    }
}

/// Decoded text of a value whose separators were all percent-encoded
///
/// Form encoders escape `:` and `,` as `%3A` / `%2C`, so `name%3Aasc` only
/// shows its structure after decoding. Values holding a literal separator
/// were written token by token and are split before decoding.
fn escaped_separators(raw: &str) -> Option<String> {
    if raw.contains([':', ',']) {
        return None;
    }
    let decoded = decode_component(raw);
    decoded.contains([':', ',']).then_some(decoded)
}

fn decode_component(raw: &str) -> String {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| spaced.into_owned())
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.parse::<u32>().ok().filter(|n| *n > 0)
}
