// Store capability interface consumed by the query and aggregation layers

pub mod memory;

use serde_json::{Map, Value};
use snafu::Snafu;

pub use memory::MemoryStore;

/// A single storage row as returned by the store, keyed by column name
pub type Row = Map<String, Value>;

#[derive(Debug, Snafu)]
pub enum StoreError {
    #[snafu(display("Unknown table: {table}"))]
    UnknownTable { table: String },
    #[snafu(display("Query on {table} returned {rows} rows where at most one was expected"))]
    TooManyRows { table: String, rows: usize },
    #[snafu(display("Could not decode {table} row"))]
    Decode {
        table: String,
        source: serde_json::Error,
    },
    #[snafu(display("Store unavailable: {reason}"))]
    Unavailable { reason: String },
}

/// How the store should report the number of matching rows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountMode {
    /// Rows only, no count
    None,
    /// Rows plus the exact number of rows matching the predicates (ignoring range/limit)
    Exact,
    /// Count only; no row data is materialized
    Head,
}

/// A single narrowing condition, as recorded by a query builder
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq { column: String, value: String },
    In { column: String, values: Vec<String> },
    Gte { column: String, value: String },
    Lte { column: String, value: String },
    ILike { column: String, pattern: String },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Gte { column, .. }
            | Predicate::Lte { column, .. }
            | Predicate::ILike { column, .. } => column,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct QueryResponse {
    pub data: Vec<Row>,
    pub count: Option<u64>,
}

/// Narrow builder interface over a relational store.
///
/// Every method consumes the builder and returns the narrowed builder so calls can be
/// chained; nothing touches the store until [`QueryBuilder::execute`] is called.
pub trait QueryBuilder: Sized {
    fn eq(self, column: &str, value: &str) -> Self;

    fn in_list(self, column: &str, values: &[String]) -> Self;

    fn gte(self, column: &str, value: &str) -> Self;

    fn lte(self, column: &str, value: &str) -> Self;

    /// Case-insensitive pattern match, `%` and `_` are wildcards and `\` escapes them
    fn ilike(self, column: &str, pattern: &str) -> Self;

    /// Add a sort key. Later calls break ties left by earlier ones.
    fn order(self, column: &str, ascending: bool) -> Self;

    /// Inclusive row window, zero based
    fn range(self, from: usize, to: usize) -> Self;

    fn limit(self, count: usize) -> Self;

    /// Expect at most one row; more than one is an error
    fn single(self) -> Self;

    fn execute(self) -> Result<QueryResponse, StoreError>;
}

/// Text form of a scalar cell, `None` for NULL, arrays and objects
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Entry point into a store: every query starts with a `select`
pub trait RowStore {
    type Query: QueryBuilder;

    fn select(&self, table: &str, columns: &str, count: CountMode) -> Self::Query;
}
