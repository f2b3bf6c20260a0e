// Normalization of loosely-typed request parameters into canonical filters and
// pagination options

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;
pub const DEFAULT_SORT_COLUMN: &str = "id";

/// Parameters that drive pagination, range or search instead of naming a filter column
const RESERVED_PARAMS: [&str; 10] = [
    "page", "limit", "pageSize", "sort", "dir", "query", "filter", "from", "to", "search",
];
const GRAMMAR_PARAMS: [&str; 2] = ["query", "filter"];

/// A single request parameter as received from the HTTP layer
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Null,
    Single(String),
    Many(Vec<String>),
}

impl ParamValue {
    /// Non-empty values carried by this parameter
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::Null => Vec::new(),
            ParamValue::Single(v) => Some(v.as_str()).filter(|v| !v.is_empty()).into_iter().collect(),
            ParamValue::Many(vs) => vs.iter().map(String::as_str).filter(|v| !v.is_empty()).collect(),
        }
    }

    fn first(&self) -> Option<&str> {
        self.values().into_iter().next()
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::Many(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::Many(value.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawParams {
    values: BTreeMap<String, ParamValue>,
}

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Build from query-string style pairs, a repeated key becomes a multi-valued parameter
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            let (key, value): (String, String) = (key.into(), value.into());
            let merged = match params.values.remove(&key) {
                None | Some(ParamValue::Null) => ParamValue::Single(value),
                Some(ParamValue::Single(existing)) => ParamValue::Many(vec![existing, value]),
                Some(ParamValue::Many(mut existing)) => {
                    existing.push(value);
                    ParamValue::Many(existing)
                }
            };
            params.values.insert(key, merged);
        }
        params
    }

    /// Build from a JSON object, scalars are stringified and nested objects ignored
    pub fn from_json(value: &Value) -> Self {
        let mut params = Self::new();
        let Some(object) = value.as_object() else {
            return params;
        };
        for (key, value) in object {
            let param = match value {
                Value::Array(items) => {
                    ParamValue::Many(items.iter().filter_map(json_scalar).collect())
                }
                other => json_scalar(other)
                    .map(ParamValue::Single)
                    .unwrap_or(ParamValue::Null),
            };
            params.values.insert(key.clone(), param);
        }
        params
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.get(k).and_then(ParamValue::first))
    }
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Canonical, always array-shaped filter set
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(flatten)]
    pub columns: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl QueryFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_column<S: AsRef<str>>(mut self, column: &str, values: &[S]) -> Self {
        self.add_values(column, values.iter().map(|v| v.as_ref()));
        self
    }

    pub fn with_range(mut self, from: Option<&str>, to: Option<&str>) -> Self {
        self.from = from.map(str::to_string);
        self.to = to.map(str::to_string);
        self
    }

    pub fn with_search(mut self, search: &str) -> Self {
        self.search = Some(search.to_string());
        self
    }

    /// Union `values` into the accepted set for `column`, empty values are dropped and a
    /// column ends up absent rather than with an empty list
    pub fn add_values<'v>(&mut self, column: &str, values: impl IntoIterator<Item = &'v str>) {
        let mut incoming = values.into_iter().filter(|v| !v.is_empty()).peekable();
        if column.is_empty() || incoming.peek().is_none() {
            return;
        }
        let accepted = self.columns.entry(column.to_string()).or_default();
        for value in incoming {
            if !accepted.iter().any(|v| v == value) {
                accepted.push(value.to_string());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.from.is_none() && self.to.is_none() && self.search.is_none()
    }

    /// Stable textual form used to deduplicate identical queries within a request.
    /// Value order does not matter, so values are sorted here.
    pub fn cache_key(&self) -> String {
        let mut key = String::new();
        for (column, values) in &self.columns {
            key.push_str(&format!("{}={};", column, values.iter().sorted().join(",")));
        }
        for (name, value) in [("from", &self.from), ("to", &self.to), ("search", &self.search)] {
            if let Some(value) = value {
                key.push_str(&format!("@{}={};", name, value));
            }
        }
        key
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// Anything other than a case-insensitive "asc" means descending
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(dir) if dir.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    pub fn is_ascending(&self) -> bool {
        *self == SortDirection::Asc
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationOptions {
    pub page: usize,
    pub limit: usize,
    pub sort: String,
    pub dir: SortDirection,
}

impl PaginationOptions {
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort: DEFAULT_SORT_COLUMN.to_string(),
            dir: SortDirection::Desc,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageDefaults {
    pub limit: usize,
    pub max_limit: usize,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            max_limit: MAX_PAGE_LIMIT,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedQuery {
    pub filters: QueryFilters,
    pub options: PaginationOptions,
}

/// Parse a positive integer, anything unparsable, non-finite or below 1 yields `None`
fn parse_positive(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let parsed = match raw.parse::<i64>() {
        Ok(n) => n as f64,
        Err(_) => raw.parse::<f64>().ok()?.trunc(),
    };
    (parsed.is_finite() && parsed >= 1.0 && parsed <= usize::MAX as f64).then_some(parsed as usize)
}

pub fn normalize_params(params: &RawParams, defaults: &PageDefaults) -> NormalizedQuery {
    let mut filters = QueryFilters::new();
    for (key, value) in &params.values {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        filters.add_values(key, value.values());
    }

    for grammar in GRAMMAR_PARAMS
        .iter()
        .filter_map(|k| params.get(k))
        .flat_map(ParamValue::values)
    {
        for (column, values) in parse_filter_grammar(grammar) {
            filters.add_values(&column, values.iter().map(String::as_str));
        }
    }

    filters.from = params.first_of(&["from"]).map(str::to_string);
    filters.to = params.first_of(&["to"]).map(str::to_string);
    filters.search = params.first_of(&["search"]).map(str::to_string);

    let page = params
        .first_of(&["page"])
        .and_then(parse_positive)
        .unwrap_or(1);
    let limit = params
        .first_of(&["limit", "pageSize"])
        .and_then(parse_positive)
        .unwrap_or(defaults.limit)
        .min(defaults.max_limit);
    let options = PaginationOptions {
        page,
        limit,
        sort: params
            .first_of(&["sort"])
            .unwrap_or(DEFAULT_SORT_COLUMN)
            .to_string(),
        dir: SortDirection::parse(params.first_of(&["dir"])),
    };

    NormalizedQuery { filters, options }
}

/// Parse the free-text filter grammar `key:v1,v2;key2:v3`.
///
/// Segments without a `:` or with an empty key are skipped. A key repeated across
/// segments accumulates the union of its values.
pub fn parse_filter_grammar(input: &str) -> BTreeMap<String, Vec<String>> {
    let mut parsed = QueryFilters::new();
    for segment in input.split(';') {
        let Some((key, raw_values)) = segment.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        parsed.add_values(key, raw_values.split(',').map(str::trim));
    }
    parsed.columns
}
