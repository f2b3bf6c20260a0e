use serde::Serialize;

use super::filters::{PaginationOptions, QueryFilters, SortDirection};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: usize,
    pub total_pages: usize,
    pub next_page: Option<usize>,
}

impl PaginationMeta {
    pub fn new(count: u64, current_page: usize, limit: usize) -> Self {
        let total_pages = (count as usize).div_ceil(limit.max(1));
        Self {
            current_page,
            total_pages,
            next_page: (current_page < total_pages).then_some(current_page + 1),
        }
    }
}

/// Metadata returned alongside every offset-paginated list
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMeta {
    pub page: usize,
    pub limit: usize,
    pub sort: String,
    pub dir: SortDirection,
    pub count: u64,
    pub filters: QueryFilters,
    pub total_pages: usize,
    pub next_page: Option<usize>,
}

impl ListMeta {
    pub fn new(options: &PaginationOptions, filters: &QueryFilters, count: u64) -> Self {
        let pagination = PaginationMeta::new(count, options.page, options.limit);
        Self {
            page: options.page,
            limit: options.limit,
            sort: options.sort.clone(),
            dir: options.dir,
            count,
            filters: filters.clone(),
            total_pages: pagination.total_pages,
            next_page: pagination.next_page,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    pub meta: ListMeta,
}

/// One keyset-paginated slice of a collection
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPage<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        let meta = PaginationMeta::new(25, 1, 10);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.next_page, Some(2));
    }

    #[test]
    fn test_last_page_has_no_next_page() {
        let meta = PaginationMeta::new(25, 3, 10);
        assert_eq!(meta.next_page, None);

        let beyond = PaginationMeta::new(25, 7, 10);
        assert_eq!(beyond.next_page, None);
    }

    #[test]
    fn test_empty_collection() {
        let meta = PaginationMeta::new(0, 1, 10);
        assert_eq!(meta.total_pages, 0);
        assert_eq!(meta.next_page, None);
    }

    #[test]
    fn test_list_meta_copies_request_shape() {
        let options = PaginationOptions {
            page: 2,
            limit: 5,
            sort: "date".to_string(),
            dir: SortDirection::Asc,
        };
        let filters = QueryFilters::new().with_column("track_id", &["t1"]);
        let meta = ListMeta::new(&options, &filters, 11);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.next_page, Some(3));
        assert_eq!(meta.filters, filters);

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["dir"], "asc");
        assert_eq!(json["filters"]["track_id"][0], "t1");
    }
}
