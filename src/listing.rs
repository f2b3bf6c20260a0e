// Offset and keyset listings of domain records

use std::cmp::Ordering;

use log::{debug, error};

use crate::PaddockError;
use crate::domain::{FromRow, map_rows};
use crate::query::cursor::{self, Cursor};
use crate::query::filters::MAX_PAGE_LIMIT;
use crate::query::{
    CursorPage, ListMeta, ListResponse, PageDefaults, PaginationOptions, QueryFilters, RawParams,
    apply_filters, apply_pagination, normalize_params,
};
use crate::store::{CountMode, QueryBuilder, Row, RowStore, StoreError, value_text};

fn store_failure(table: &'static str) -> impl FnOnce(StoreError) -> PaddockError {
    move |source| {
        error!("Listing {} failed: {}", table, source);
        PaddockError::Store { source }
    }
}

/// One page of `T` records matching `filters`, with the total match count.
///
/// A failed query is an error, never an empty page.
pub fn list_entities<S: RowStore, T: FromRow>(
    store: &S,
    filters: &QueryFilters,
    options: &PaginationOptions,
) -> Result<ListResponse<T>, PaddockError> {
    let entity = T::ENTITY;
    let query = apply_filters(
        store.select(entity.table(), "*", CountMode::Exact),
        filters,
        &entity.into(),
    );
    let response = apply_pagination(query, options)
        .execute()
        .map_err(store_failure(entity.table()))?;

    let count = response.count.unwrap_or(response.data.len() as u64);
    let data = map_rows::<T>(response.data)?;
    debug!(
        "Listed {} of {} {} rows on page {}",
        data.len(),
        count,
        entity.table(),
        options.page
    );
    Ok(ListResponse {
        data,
        meta: ListMeta::new(options, filters, count),
    })
}

/// Normalize raw request parameters and list the matching page
pub fn list_from_params<S: RowStore, T: FromRow>(
    store: &S,
    params: &RawParams,
    defaults: &PageDefaults,
) -> Result<ListResponse<T>, PaddockError> {
    let normalized = normalize_params(params, defaults);
    list_entities(store, &normalized.filters, &normalized.options)
}

/// Numeric comparison when both sides are numbers, text comparison otherwise
fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn cell_text(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(value_text)
}

/// Whether `row` comes strictly after `position` in (timestamp desc, key desc) order
fn is_after(row: &Row, position: &Cursor, timestamp_column: &str, key_column: &str) -> bool {
    let Some(timestamp) = cell_text(row, timestamp_column) else {
        return false;
    };
    match compare_text(&timestamp, &position.t) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => cell_text(row, key_column)
            .is_some_and(|key| compare_text(&key, &position.id) == Ordering::Less),
    }
}

/// Records after the `token` cursor in newest-first order.
///
/// A token that cannot be decoded starts from the beginning of the collection. The
/// returned `next_cursor` is `None` once the collection is exhausted.
pub fn list_after_cursor<S: RowStore, T: FromRow>(
    store: &S,
    filters: &QueryFilters,
    token: Option<&str>,
    limit: usize,
) -> Result<CursorPage<T>, PaddockError> {
    let entity = T::ENTITY;
    let timestamp_column = entity.timestamp_column();
    let key_column = entity.key_column();
    let limit = limit.clamp(1, MAX_PAGE_LIMIT);

    let position = cursor::decode(token);
    if token.is_some_and(|c| !c.is_empty()) && position.is_none() {
        debug!("Undecodable cursor for {}, starting from the top", entity.table());
    }

    // one extra row tells whether another page exists
    let wanted = limit + 1;
    let mut page: Vec<Row> = Vec::with_capacity(wanted);
    let mut offset = 0;
    loop {
        let mut query = apply_filters(
            store.select(entity.table(), "*", CountMode::None),
            filters,
            &entity.into(),
        );
        if let Some(position) = &position {
            query = query.lte(timestamp_column, &position.t);
        }
        let batch = query
            .order(timestamp_column, false)
            .order(key_column, false)
            .range(offset, offset + wanted - 1)
            .execute()
            .map_err(store_failure(entity.table()))?
            .data;

        let fetched = batch.len();
        let room = wanted - page.len();
        page.extend(
            batch
                .into_iter()
                .filter(|row| {
                    position
                        .as_ref()
                        .is_none_or(|p| is_after(row, p, timestamp_column, key_column))
                })
                .take(room),
        );
        if page.len() >= wanted || fetched < wanted {
            break;
        }
        offset += fetched;
    }

    let next_cursor = if page.len() > limit {
        page.truncate(limit);
        page.last().and_then(|row| {
            let t = cell_text(row, timestamp_column)?;
            let id = cell_text(row, key_column)?;
            Some(cursor::encode(&Cursor::new(t, id)))
        })
    } else {
        None
    };

    Ok(CursorPage {
        data: map_rows::<T>(page)?,
        next_cursor,
    })
}
