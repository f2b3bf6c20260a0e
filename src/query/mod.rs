// Request normalization, predicate building and pagination

pub mod cursor;
pub mod entity;
pub mod filters;
pub mod pagination;
pub mod predicate;

pub use cursor::Cursor;
pub use entity::Entity;
pub use filters::{
    NormalizedQuery, PageDefaults, PaginationOptions, ParamValue, QueryFilters, RawParams,
    SortDirection, normalize_params, parse_filter_grammar,
};
pub use pagination::{CursorPage, ListMeta, ListResponse, PaginationMeta};
pub use predicate::{PredicateTargets, apply_filters, apply_pagination};
