//! Query-spec construction for list operations
//!
//! This module translates raw string-keyed query parameters into a
//! [`QuerySpec`]: a fully-resolved description of a read request (filter,
//! sort, projection, page window). The four stages compose in a fixed
//! order — filter, then sort, then project, then paginate — because the
//! page window must see the final filtered and sorted result set.
//!
//! Grammar accepted from the query string:
//!
//! - `field=value` — equality constraint
//! - `field[gt|gte|lt|lte]=value` — range constraint
//! - `sort=field1,-field2` — composite sort, `-` prefix for descending
//! - `fields=field1,field2` — projection allow-list
//! - `page=N`, `limit=N` — page window
//!
//! # Example
//!
//! ```rust
//! use trailhead::query::{QueryOptions, SortOrder};
//!
//! let options = QueryOptions::from_pairs(vec![
//!     ("price[gte]".to_string(), "100".to_string()),
//!     ("sort".to_string(), "-price".to_string()),
//!     ("limit".to_string(), "2".to_string()),
//! ]);
//! let spec = options.into_spec();
//!
//! assert_eq!(spec.filter.len(), 1);
//! assert_eq!(spec.sort_keys[0].order, SortOrder::Desc);
//! assert_eq!(spec.limit, 2);
//! assert_eq!(spec.skip(), 0);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default page number when absent or malformed
pub const DEFAULT_PAGE: u64 = 1;

/// Default page size when absent or malformed
pub const DEFAULT_LIMIT: u64 = 100;

/// Keys that drive the pipeline rather than the filter predicate
pub const RESERVED_KEYS: [&str; 4] = ["sort", "page", "fields", "limit"];

/// Comparison operators for filter constraints
///
/// The query-string grammar only produces `Eq` and the four range
/// operators; `Ne` exists for internal base filters (hidden tours,
/// deactivated users).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to (internal use only)
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal to
    Gte,
    /// Less than
    Lt,
    /// Less than or equal to
    Lte,
}

impl FilterOperator {
    /// Parse an operator suffix from the query-string grammar.
    ///
    /// Only the four range operators are addressable from the outside.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            _ => None,
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "eq"),
            Self::Ne => write!(f, "ne"),
            Self::Gt => write!(f, "gt"),
            Self::Gte => write!(f, "gte"),
            Self::Lt => write!(f, "lt"),
            Self::Lte => write!(f, "lte"),
        }
    }
}

/// A value a field is compared against
///
/// Query-string constraints arrive as raw strings; coercion against the
/// stored field's type is the store's responsibility at match time.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value, or a raw query-string value awaiting coercion
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// Null value
    Null,
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// A single filter constraint: field, operator, value
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Equality constraint
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Inequality constraint (internal base filters only)
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Ne, value)
    }

    /// Greater-than constraint
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Gt, value)
    }

    /// Greater-or-equal constraint
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Gte, value)
    }

    /// Less-than constraint
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Lt, value)
    }

    /// Less-or-equal constraint
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Lte, value)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending (A-Z, 0-9, oldest first)
    #[default]
    Asc,
    /// Descending (Z-A, 9-0, newest first)
    Desc,
}

/// One key of a composite sort, primary-first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub order: SortOrder,
}

impl SortKey {
    /// Parse `name` or `-name` from the sort grammar
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                order: SortOrder::Desc,
            },
            None => Self {
                field: raw.to_string(),
                order: SortOrder::Asc,
            },
        }
    }
}

/// Which fields a returned record carries
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// All fields except the internal revision metadata field
    #[default]
    DefaultDenyList,
    /// Exactly the named fields, plus the identifier
    Fields(Vec<String>),
}

/// A fully-resolved description of a read request
///
/// Constructed fresh per request, consumed exactly once; never persisted
/// or reused.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub filter: Vec<FilterCondition>,
    pub sort_keys: Vec<SortKey>,
    pub projection: Projection,
    pub page: u64,
    pub limit: u64,
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            sort_keys: Vec::new(),
            projection: Projection::default(),
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QuerySpec {
    /// Number of records skipped before the page window: `(page-1) * limit`
    #[must_use]
    pub fn skip(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    /// Prepend a constraint ahead of the client-supplied filter.
    ///
    /// Used for parent-resource scoping and repository base filters.
    #[must_use]
    pub fn with_scope(mut self, condition: FilterCondition) -> Self {
        self.filter.insert(0, condition);
        self
    }
}

/// Raw string-keyed query parameters, as taken from the request
///
/// Order is preserved so that the last duplicate of a key wins.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pairs: Vec<(String, String)>,
}

impl QueryOptions {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Last value for a key, mirroring last-one-wins semantics
    fn last(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Run the full pipeline: filter → sort → project → paginate.
    #[must_use]
    pub fn into_spec(self) -> QuerySpec {
        QueryBuilder::new(self)
            .filtering()
            .sorting()
            .fields_limiting()
            .paginating()
            .build()
    }
}

/// Stage-by-stage builder from [`QueryOptions`] to [`QuerySpec`]
///
/// The stages must be applied in declaration order; [`QueryOptions::into_spec`]
/// is the conventional entry point.
#[derive(Debug)]
pub struct QueryBuilder {
    options: QueryOptions,
    spec: QuerySpec,
}

impl QueryBuilder {
    pub fn new(options: QueryOptions) -> Self {
        Self {
            options,
            spec: QuerySpec::default(),
        }
    }

    /// Strip reserved keys; remaining keys become equality constraints,
    /// except those carrying a `[gt|gte|lt|lte]` operator suffix. Values
    /// pass through unmodified. Duplicated constraints on the same field
    /// and operator: last one wins.
    #[must_use]
    pub fn filtering(mut self) -> Self {
        let mut conditions: Vec<FilterCondition> = Vec::new();
        for (key, value) in &self.options.pairs {
            let (field, operator) = match parse_filter_key(key) {
                Some(parsed) => parsed,
                None => continue,
            };
            let condition = FilterCondition::new(field, operator, value.as_str());
            if let Some(existing) = conditions
                .iter_mut()
                .find(|c| c.field == condition.field && c.operator == condition.operator)
            {
                *existing = condition;
            } else {
                conditions.push(condition);
            }
        }
        self.spec.filter = conditions;
        self
    }

    /// Comma-separated sort keys, `-` prefix for descending; natural
    /// (insertion) order when absent.
    #[must_use]
    pub fn sorting(mut self) -> Self {
        if let Some(raw) = self.options.last("sort") {
            self.spec.sort_keys = raw
                .split(',')
                .filter(|s| !s.is_empty())
                .map(SortKey::parse)
                .collect();
        }
        self
    }

    /// Comma-separated allow-list of returned fields. Presence overrides
    /// the default deny-list entirely.
    #[must_use]
    pub fn fields_limiting(mut self) -> Self {
        if let Some(raw) = self.options.last("fields") {
            let fields: Vec<String> = raw
                .split(',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !fields.is_empty() {
                self.spec.projection = Projection::Fields(fields);
            }
        }
        self
    }

    /// Page window. Non-numeric, missing, or zero values fall back to the
    /// defaults silently.
    #[must_use]
    pub fn paginating(mut self) -> Self {
        self.spec.page = parse_window(self.options.last("page"), DEFAULT_PAGE);
        self.spec.limit = parse_window(self.options.last("limit"), DEFAULT_LIMIT);
        self
    }

    #[must_use]
    pub fn build(self) -> QuerySpec {
        self.spec
    }
}

/// Split `price[gte]` into `("price", Gte)`; bare keys are equality.
/// Reserved keys and unknown operator suffixes produce no constraint.
fn parse_filter_key(key: &str) -> Option<(String, FilterOperator)> {
    if RESERVED_KEYS.contains(&key) {
        return None;
    }
    if let Some((field, rest)) = key.split_once('[') {
        let suffix = rest.strip_suffix(']')?;
        let operator = FilterOperator::from_suffix(suffix)?;
        return Some((field.to_string(), operator));
    }
    Some((key.to_string(), FilterOperator::Eq))
}

fn parse_window(raw: Option<&str>, default: u64) -> u64 {
    match raw.and_then(|v| v.parse::<u64>().ok()) {
        Some(n) if n >= 1 => n,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> QueryOptions {
        QueryOptions::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn skip_matches_page_and_limit() {
        for (page, limit) in [(1u64, 100u64), (2, 10), (3, 50), (7, 1)] {
            let spec = options(&[
                ("page", &page.to_string()),
                ("limit", &limit.to_string()),
            ])
            .into_spec();
            assert_eq!(spec.skip(), (page - 1) * limit);
        }
    }

    #[test]
    fn malformed_pagination_falls_back_silently() {
        for raw in ["abc", "", "-3", "0", "1.5"] {
            let spec = options(&[("page", raw), ("limit", raw)]).into_spec();
            assert_eq!(spec.page, DEFAULT_PAGE);
            assert_eq!(spec.limit, DEFAULT_LIMIT);
        }

        let spec = options(&[]).into_spec();
        assert_eq!(spec.page, DEFAULT_PAGE);
        assert_eq!(spec.limit, DEFAULT_LIMIT);
        assert_eq!(spec.skip(), 0);
    }

    #[test]
    fn non_reserved_keys_become_equality_constraints() {
        let spec = options(&[("difficulty", "easy"), ("duration", "5")]).into_spec();
        assert_eq!(spec.filter.len(), 2);
        assert_eq!(spec.filter[0].field, "difficulty");
        assert_eq!(spec.filter[0].operator, FilterOperator::Eq);
        assert_eq!(spec.filter[0].value, FilterValue::String("easy".into()));
    }

    #[test]
    fn operator_suffixes_become_range_constraints() {
        let spec = options(&[
            ("price[gte]", "100"),
            ("price[lt]", "500"),
            ("duration[gt]", "3"),
            ("rating[lte]", "4.5"),
        ])
        .into_spec();
        let ops: Vec<_> = spec.filter.iter().map(|c| c.operator).collect();
        assert_eq!(
            ops,
            vec![
                FilterOperator::Gte,
                FilterOperator::Lt,
                FilterOperator::Gt,
                FilterOperator::Lte
            ]
        );
    }

    #[test]
    fn unknown_operator_suffix_is_dropped() {
        let spec = options(&[("price[near]", "100")]).into_spec();
        assert!(spec.filter.is_empty());
    }

    #[test]
    fn reserved_keys_never_become_filters() {
        let spec = options(&[
            ("sort", "price"),
            ("page", "2"),
            ("fields", "name"),
            ("limit", "10"),
            ("price", "50"),
        ])
        .into_spec();
        assert_eq!(spec.filter.len(), 1);
        assert_eq!(spec.filter[0].field, "price");
    }

    #[test]
    fn duplicate_constraint_last_one_wins() {
        let spec = options(&[("price", "50"), ("price", "80")]).into_spec();
        assert_eq!(spec.filter.len(), 1);
        assert_eq!(spec.filter[0].value, FilterValue::String("80".into()));
    }

    #[test]
    fn sort_parses_composite_keys_primary_first() {
        let spec = options(&[("sort", "ratings_average,-price")]).into_spec();
        assert_eq!(spec.sort_keys.len(), 2);
        assert_eq!(spec.sort_keys[0].field, "ratings_average");
        assert_eq!(spec.sort_keys[0].order, SortOrder::Asc);
        assert_eq!(spec.sort_keys[1].field, "price");
        assert_eq!(spec.sort_keys[1].order, SortOrder::Desc);
    }

    #[test]
    fn absent_sort_means_natural_order() {
        let spec = options(&[("price", "50")]).into_spec();
        assert!(spec.sort_keys.is_empty());
    }

    #[test]
    fn fields_override_the_default_deny_list() {
        let spec = options(&[("fields", "name,price")]).into_spec();
        assert_eq!(
            spec.projection,
            Projection::Fields(vec!["name".into(), "price".into()])
        );

        let spec = options(&[]).into_spec();
        assert_eq!(spec.projection, Projection::DefaultDenyList);
    }

    #[test]
    fn with_scope_prepends_condition() {
        let spec = options(&[("rating", "5")])
            .into_spec()
            .with_scope(FilterCondition::eq("tour", "abc"));
        assert_eq!(spec.filter[0].field, "tour");
        assert_eq!(spec.filter[1].field, "rating");
    }

    #[test]
    fn pipeline_is_deterministic() {
        let build = || {
            options(&[
                ("price[gte]", "100"),
                ("sort", "-price"),
                ("fields", "name,price"),
                ("page", "2"),
                ("limit", "3"),
            ])
            .into_spec()
        };
        assert_eq!(build(), build());
    }
}
