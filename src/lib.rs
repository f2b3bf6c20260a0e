// Library interface for paddock
// Integration tests and the CLI go through these modules

pub mod config;
pub mod domain;
pub mod errors;
pub mod listing;
pub mod query;
pub mod stats;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use domain::{Lap, Session, TelemetryPoint, Track};
pub use errors::PaddockError;
pub use listing::{list_after_cursor, list_entities, list_from_params};
pub use query::{Entity, NormalizedQuery, QueryFilters, RawParams, normalize_params};
pub use stats::{
    AggregationEngine, DashboardAggregate, Metric, RequestCache, SessionReport,
    dashboard_aggregate_concurrent,
};
pub use store::{MemoryStore, QueryBuilder, RowStore, StoreError};
