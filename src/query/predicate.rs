// Translation of canonical filters into chained store predicates

use log::debug;

use super::entity::Entity;
use super::filters::{PaginationOptions, QueryFilters};
use crate::store::QueryBuilder;

/// Columns the non-IN predicates are applied to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredicateTargets<'a> {
    pub timestamp_column: &'a str,
    pub search_column: Option<&'a str>,
}

impl From<Entity> for PredicateTargets<'static> {
    fn from(entity: Entity) -> Self {
        Self {
            timestamp_column: entity.timestamp_column(),
            search_column: entity.search_column(),
        }
    }
}

/// Escape LIKE metacharacters so a search term only ever matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Chain one predicate per active filter onto `query`.
///
/// Every predicate narrows (logical AND) and columns are visited in sorted order, so
/// the same filter set always yields the same predicate chain. Columns with no
/// accepted values are skipped, an empty IN list would exclude every row.
pub fn apply_filters<Q: QueryBuilder>(
    query: Q,
    filters: &QueryFilters,
    targets: &PredicateTargets<'_>,
) -> Q {
    let mut query = query;
    for (column, values) in &filters.columns {
        if values.is_empty() {
            continue;
        }
        query = query.in_list(column, values);
    }

    if let Some(from) = filters.from.as_deref().filter(|v| !v.is_empty()) {
        query = query.gte(targets.timestamp_column, from);
    }
    if let Some(to) = filters.to.as_deref().filter(|v| !v.is_empty()) {
        query = query.lte(targets.timestamp_column, to);
    }

    if let Some(search) = filters.search.as_deref().filter(|v| !v.is_empty()) {
        match targets.search_column {
            Some(column) => {
                query = query.ilike(column, &format!("%{}%", escape_like(search)));
            }
            None => debug!("Ignoring search '{}', no searchable column", search),
        }
    }
    query
}

/// Order by the requested column and restrict to the requested page
pub fn apply_pagination<Q: QueryBuilder>(query: Q, options: &PaginationOptions) -> Q {
    let offset = options.offset();
    query
        .order(&options.sort, options.dir.is_ascending())
        .range(offset, offset.saturating_add(options.limit.max(1) - 1))
}
