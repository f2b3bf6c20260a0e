// In-memory reference backend for the store capability traits

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::Value;

use super::{
    CountMode, Predicate, QueryBuilder, QueryResponse, Row, RowStore, StoreError, value_text,
};
use crate::errors::PaddockError;

const TABLE_FILE_EXTENSION: &str = "jsonl";

/// Row store holding whole tables in memory.
///
/// Tables are shared between queries through `Arc`, so issuing a query never copies a
/// table until rows are actually returned.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Arc<Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper used by tests and fixtures
    pub fn with_table(mut self, table: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(table.to_string(), Arc::new(rows));
        self
    }

    /// Load every `<table>.jsonl` file found in `dir`, one row per line
    pub fn from_dir(dir: &Path) -> Result<Self, PaddockError> {
        let entries = fs::read_dir(dir).map_err(|e| PaddockError::TableLoad {
            path: dir.display().to_string(),
            source: e,
        })?;

        let mut store = Self::new();
        for entry in entries {
            let path = entry
                .map_err(|e| PaddockError::TableLoad {
                    path: dir.display().to_string(),
                    source: e,
                })?
                .path();
            if !path.is_file()
                || path.extension().and_then(|s| s.to_str()) != Some(TABLE_FILE_EXTENSION)
            {
                continue;
            }
            let Some(table) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let rows = serde_jsonlines::json_lines::<Row, _>(&path)
                .and_then(|lines| lines.collect::<Result<Vec<Row>, std::io::Error>>())
                .map_err(|e| PaddockError::TableLoad {
                    path: path.display().to_string(),
                    source: e,
                })?;
            info!("Loaded {} rows into table {}", rows.len(), table);
            store.tables.insert(table.to_string(), Arc::new(rows));
        }

        if store.tables.is_empty() {
            warn!("No {} tables found in {:?}", TABLE_FILE_EXTENSION, dir);
        }
        Ok(store)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl RowStore for MemoryStore {
    type Query = MemoryQuery;

    fn select(&self, table: &str, columns: &str, count: CountMode) -> MemoryQuery {
        let columns = match columns.trim() {
            "" | "*" => None,
            list => Some(
                list.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect(),
            ),
        };
        MemoryQuery {
            table: table.to_string(),
            rows: self.tables.get(table).cloned(),
            columns,
            count,
            predicates: Vec::new(),
            orders: Vec::new(),
            window: None,
            limit: None,
            single: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MemoryQuery {
    table: String,
    rows: Option<Arc<Vec<Row>>>,
    columns: Option<Vec<String>>,
    count: CountMode,
    predicates: Vec<Predicate>,
    orders: Vec<(String, bool)>,
    window: Option<(usize, usize)>,
    limit: Option<usize>,
    single: bool,
}

impl MemoryQuery {
    /// Predicates chained so far, in application order
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn orders(&self) -> &[(String, bool)] {
        &self.orders
    }

    fn push(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

impl QueryBuilder for MemoryQuery {
    fn eq(self, column: &str, value: &str) -> Self {
        self.push(Predicate::Eq {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    fn in_list(self, column: &str, values: &[String]) -> Self {
        self.push(Predicate::In {
            column: column.to_string(),
            values: values.to_vec(),
        })
    }

    fn gte(self, column: &str, value: &str) -> Self {
        self.push(Predicate::Gte {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    fn lte(self, column: &str, value: &str) -> Self {
        self.push(Predicate::Lte {
            column: column.to_string(),
            value: value.to_string(),
        })
    }

    fn ilike(self, column: &str, pattern: &str) -> Self {
        self.push(Predicate::ILike {
            column: column.to_string(),
            pattern: pattern.to_string(),
        })
    }

    fn order(mut self, column: &str, ascending: bool) -> Self {
        self.orders.push((column.to_string(), ascending));
        self
    }

    fn range(mut self, from: usize, to: usize) -> Self {
        self.window = Some((from, to));
        self
    }

    fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    fn single(mut self) -> Self {
        self.single = true;
        self
    }

    fn execute(self) -> Result<QueryResponse, StoreError> {
        let rows = self.rows.ok_or_else(|| StoreError::UnknownTable {
            table: self.table.clone(),
        })?;

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| self.predicates.iter().all(|p| row_matches(row, p)))
            .collect();
        let total = matched.len() as u64;
        debug!(
            "{} of {} rows in {} matched {} predicates",
            total,
            rows.len(),
            self.table,
            self.predicates.len()
        );

        if self.count == CountMode::Head {
            return Ok(QueryResponse {
                data: Vec::new(),
                count: Some(total),
            });
        }

        if !self.orders.is_empty() {
            matched.sort_by(|a, b| {
                self.orders
                    .iter()
                    .map(|(column, ascending)| compare_rows(a, b, column, *ascending))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let mut windowed: Vec<&Row> = match self.window {
            Some((from, to)) if to >= from => matched
                .into_iter()
                .skip(from)
                .take((to - from).saturating_add(1))
                .collect(),
            Some(_) => Vec::new(),
            None => matched,
        };
        if let Some(limit) = self.limit {
            windowed.truncate(limit);
        }

        if self.single && windowed.len() > 1 {
            return Err(StoreError::TooManyRows {
                table: self.table,
                rows: windowed.len(),
            });
        }

        let data = windowed
            .into_iter()
            .map(|row| project(row, self.columns.as_deref()))
            .collect();
        Ok(QueryResponse {
            data,
            count: match self.count {
                CountMode::Exact => Some(total),
                _ => None,
            },
        })
    }
}

fn project(row: &Row, columns: Option<&[String]>) -> Row {
    match columns {
        None => row.clone(),
        Some(columns) => columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect(),
    }
}

/// Non-null cell value; a missing column reads as NULL
fn cell<'r>(row: &'r Row, column: &str) -> Option<&'r Value> {
    row.get(column).filter(|v| !v.is_null())
}

fn row_matches(row: &Row, predicate: &Predicate) -> bool {
    let Some(value) = cell(row, predicate.column()) else {
        return false;
    };
    match predicate {
        Predicate::Eq { value: expected, .. } => value_equals(value, expected),
        Predicate::In { values, .. } => values.iter().any(|v| value_equals(value, v)),
        Predicate::Gte { value: bound, .. } => {
            matches!(compare_to_literal(value, bound), Some(Ordering::Greater | Ordering::Equal))
        }
        Predicate::Lte { value: bound, .. } => {
            matches!(compare_to_literal(value, bound), Some(Ordering::Less | Ordering::Equal))
        }
        Predicate::ILike { pattern, .. } => match value_text(value) {
            Some(text) => ilike_matches(&text, pattern),
            None => false,
        },
    }
}

fn value_equals(value: &Value, literal: &str) -> bool {
    match value {
        Value::Number(n) => match (n.as_f64(), literal.trim().parse::<f64>()) {
            (Some(a), Ok(b)) => a == b,
            _ => n.to_string() == literal,
        },
        Value::String(s) => s == literal,
        Value::Bool(b) => b.to_string() == literal,
        _ => false,
    }
}

fn compare_to_literal(value: &Value, literal: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => n.as_f64()?.partial_cmp(&literal.trim().parse::<f64>().ok()?),
        Value::String(s) => match (s.parse::<f64>(), literal.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.partial_cmp(&b),
            _ => Some(s.as_str().cmp(literal)),
        },
        _ => None,
    }
}

fn compare_rows(a: &Row, b: &Row, column: &str, ascending: bool) -> Ordering {
    // NULLs sort last in both directions
    match (cell(a, column), cell(b, column)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ordering = compare_cells(x, y);
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        }
    }
}

fn compare_cells(x: &Value, y: &Value) -> Ordering {
    match (x, y) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b))
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => match (value_text(x), value_text(y)) {
            (Some(a), Some(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
                (Ok(a), Ok(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
                _ => a.cmp(&b),
            },
            _ => Ordering::Equal,
        },
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum PatternToken {
    AnySequence,
    AnyChar,
    Literal(char),
}

fn tokenize_pattern(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => PatternToken::AnySequence,
            '_' => PatternToken::AnyChar,
            // a trailing backslash matches itself
            '\\' => PatternToken::Literal(chars.next().unwrap_or('\\')),
            c => PatternToken::Literal(c),
        });
    }
    tokens
}

/// Case-insensitive LIKE matching with `%`/`_` wildcards
pub(crate) fn ilike_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let tokens: Vec<PatternToken> = tokenize_pattern(pattern)
        .into_iter()
        .map(|t| match t {
            PatternToken::Literal(c) => {
                PatternToken::Literal(c.to_lowercase().next().unwrap_or(c))
            }
            other => other,
        })
        .collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(PatternToken::AnySequence) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(PatternToken::AnyChar) => {
                t += 1;
                p += 1;
            }
            Some(PatternToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|t| *t == PatternToken::AnySequence)
}
