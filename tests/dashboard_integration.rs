// Integration tests for the dashboard aggregates over in-memory and failing stores

use std::sync::Arc;

use paddock::query::{PageDefaults, RawParams};
use paddock::store::memory::MemoryQuery;
use paddock::store::{CountMode, QueryResponse, Row};
use paddock::{
    AggregationEngine, Metric, MemoryStore, PaddockError, QueryBuilder, RequestCache, RowStore,
    StoreError, dashboard_aggregate_concurrent, normalize_params,
};
use serde_json::{Value, json};

fn rows(values: Vec<Value>) -> Vec<Row> {
    values
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn paddock_store() -> MemoryStore {
    MemoryStore::new()
        .with_table(
            "sessions",
            rows(vec![
                json!({"id": 1, "track_id": "spa", "date": "2024-04-12", "vehicle": "Panigale V4"}),
                json!({"id": 2, "track_id": "spa", "date": "2024-06-20", "vehicle": "R1M"}),
                json!({"id": 3, "track_id": "mugello", "date": "2024-07-02", "vehicle": "RSV4"}),
            ]),
        )
        .with_table(
            "laps",
            rows(vec![
                json!({"id": 10, "session_id": 1, "track_id": "spa", "vehicle": "Panigale V4", "date": "2024-04-12", "lap_number": 0, "lap_time": 1.0, "max_speed": 311.0}),
                json!({"id": 11, "session_id": 1, "track_id": "spa", "vehicle": "Panigale V4", "date": "2024-04-12", "lap_number": 1, "lap_time": 90.5, "max_speed": 281.4}),
                json!({"id": 12, "session_id": 2, "track_id": "spa", "vehicle": "R1M", "date": "2024-06-20", "lap_number": 1, "lap_time": 91.2, "max_speed": 288.0}),
                json!({"id": 13, "session_id": 3, "track_id": "mugello", "vehicle": "RSV4", "date": "2024-07-02", "lap_number": 1, "lap_time": 108.9, "max_speed": 302.6}),
                json!({"id": 14, "session_id": 3, "track_id": "mugello", "vehicle": "RSV4", "date": "2024-07-02", "lap_number": 2, "lap_time": null, "max_speed": null}),
            ]),
        )
        .with_table("telemetry_points", Vec::new())
        .with_table(
            "tracks",
            rows(vec![
                json!({"id": "spa", "name": "Spa-Francorchamps", "country": "BE"}),
                json!({"id": "mugello", "name": "Mugello", "country": "IT"}),
            ]),
        )
}

/// Wraps a memory store and fails every query against one table
struct FlakyStore {
    inner: MemoryStore,
    failing_table: &'static str,
}

struct FlakyQuery {
    inner: MemoryQuery,
    failing: bool,
}

impl RowStore for FlakyStore {
    type Query = FlakyQuery;

    fn select(&self, table: &str, columns: &str, count: CountMode) -> FlakyQuery {
        FlakyQuery {
            inner: self.inner.select(table, columns, count),
            failing: table == self.failing_table,
        }
    }
}

impl QueryBuilder for FlakyQuery {
    fn eq(mut self, column: &str, value: &str) -> Self {
        self.inner = self.inner.eq(column, value);
        self
    }

    fn in_list(mut self, column: &str, values: &[String]) -> Self {
        self.inner = self.inner.in_list(column, values);
        self
    }

    fn gte(mut self, column: &str, value: &str) -> Self {
        self.inner = self.inner.gte(column, value);
        self
    }

    fn lte(mut self, column: &str, value: &str) -> Self {
        self.inner = self.inner.lte(column, value);
        self
    }

    fn ilike(mut self, column: &str, pattern: &str) -> Self {
        self.inner = self.inner.ilike(column, pattern);
        self
    }

    fn order(mut self, column: &str, ascending: bool) -> Self {
        self.inner = self.inner.order(column, ascending);
        self
    }

    fn range(mut self, from: usize, to: usize) -> Self {
        self.inner = self.inner.range(from, to);
        self
    }

    fn limit(mut self, count: usize) -> Self {
        self.inner = self.inner.limit(count);
        self
    }

    fn single(mut self) -> Self {
        self.inner = self.inner.single();
        self
    }

    fn execute(self) -> Result<QueryResponse, StoreError> {
        if self.failing {
            return Err(StoreError::Unavailable {
                reason: "connection reset".to_string(),
            });
        }
        self.inner.execute()
    }
}

#[test]
fn test_dashboard_over_all_sessions() {
    let store = paddock_store();
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&Default::default());

    assert_eq!(dashboard.total_sessions, Metric::Available(3));
    assert_eq!(dashboard.total_laps, Metric::Available(5));

    // lap 0 leads on both metrics but never counts
    let best = dashboard.best_lap.available().unwrap().as_ref().unwrap();
    assert_eq!(best.id, "11");
    assert_eq!(best.lap_time_seconds, Some(90.5));
    let top = dashboard.top_speed.available().unwrap().as_ref().unwrap();
    assert_eq!(top.id, "13");
}

#[test]
fn test_dashboard_from_request_params() {
    let store = paddock_store();
    let params = RawParams::new()
        .with("track_id", "spa")
        .with("from", "2024-05-01");
    let filters = normalize_params(&params, &PageDefaults::default()).filters;
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&filters);

    assert_eq!(dashboard.total_sessions, Metric::Available(1));
    assert_eq!(dashboard.total_laps, Metric::Available(1));
    let best = dashboard.best_lap.available().unwrap().as_ref().unwrap();
    assert_eq!(best.id, "12");
}

#[test]
fn test_search_narrows_every_metric_alike() {
    let store = paddock_store();
    let params = RawParams::new().with("search", "panigale");
    let filters = normalize_params(&params, &PageDefaults::default()).filters;
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&filters);

    assert_eq!(dashboard.total_sessions, Metric::Available(1));
    assert_eq!(dashboard.total_laps, Metric::Available(2));
    let best = dashboard.best_lap.available().unwrap().as_ref().unwrap();
    assert_eq!(best.session_id, "1");
    let top = dashboard.top_speed.available().unwrap().as_ref().unwrap();
    assert_eq!(top.session_id, "1");
    assert_eq!(top.id, "11");
}

#[test]
fn test_date_range_narrows_every_metric_alike() {
    let store = paddock_store();
    let params = RawParams::new()
        .with("from", "2024-06-01")
        .with("to", "2024-06-30");
    let filters = normalize_params(&params, &PageDefaults::default()).filters;
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&filters);

    assert_eq!(dashboard.total_sessions, Metric::Available(1));
    assert_eq!(dashboard.total_laps, Metric::Available(1));
    let best = dashboard.best_lap.available().unwrap().as_ref().unwrap();
    let top = dashboard.top_speed.available().unwrap().as_ref().unwrap();
    assert_eq!(best.session_id, "2");
    assert_eq!(top.session_id, "2");
}

#[test]
fn test_empty_filter_match_is_zero_not_unavailable() {
    let store = paddock_store();
    let params = RawParams::new().with("track_id", "portimao");
    let filters = normalize_params(&params, &PageDefaults::default()).filters;
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&filters);

    assert_eq!(dashboard.total_sessions, Metric::Available(0));
    assert_eq!(dashboard.total_laps, Metric::Available(0));
    assert_eq!(dashboard.best_lap, Metric::Available(None));
    assert_eq!(dashboard.top_speed, Metric::Available(None));

    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["totalLaps"], json!(0));
    assert_eq!(json["bestLap"], Value::Null);
}

#[test]
fn test_failed_lap_queries_leave_session_count_intact() {
    let store = FlakyStore {
        inner: paddock_store(),
        failing_table: "laps",
    };
    let dashboard = AggregationEngine::new(&store).dashboard_aggregate(&Default::default());

    assert_eq!(dashboard.total_sessions, Metric::Available(3));
    assert_eq!(dashboard.total_laps, Metric::Unavailable);
    assert_eq!(dashboard.best_lap, Metric::Unavailable);
    assert_eq!(dashboard.top_speed, Metric::Unavailable);

    let json = serde_json::to_value(&dashboard).unwrap();
    assert_eq!(json["totalSessions"], json!(3));
    assert_eq!(json["totalLaps"], json!("unavailable"));
}

#[test]
fn test_direct_lookup_propagates_store_failure() {
    let store = FlakyStore {
        inner: paddock_store(),
        failing_table: "laps",
    };
    let result = AggregationEngine::new(&store).best_lap(&Default::default());
    assert!(matches!(
        result,
        Err(PaddockError::Aggregation {
            source: StoreError::Unavailable { .. },
            ..
        })
    ));
}

#[test]
fn test_concurrent_dashboard_matches_sequential() {
    let store = Arc::new(paddock_store());
    let params = RawParams::new().with("track_id", vec!["spa", "mugello"]);
    let filters = normalize_params(&params, &PageDefaults::default()).filters;

    let sequential = AggregationEngine::new(store.as_ref()).dashboard_aggregate(&filters);
    let cache = Arc::new(RequestCache::new());
    let concurrent =
        dashboard_aggregate_concurrent(Arc::clone(&store), &filters, Some(Arc::clone(&cache)))
            .unwrap();

    assert_eq!(sequential, concurrent);
    assert_eq!(cache.len(), 4);
}

#[test]
fn test_concurrent_dashboard_degrades_per_metric() {
    let store = Arc::new(FlakyStore {
        inner: paddock_store(),
        failing_table: "sessions",
    });
    let dashboard = dashboard_aggregate_concurrent(store, &Default::default(), None).unwrap();

    assert_eq!(dashboard.total_sessions, Metric::Unavailable);
    assert_eq!(dashboard.total_laps, Metric::Available(5));
    assert!(dashboard.best_lap.is_available());
}

#[test]
fn test_session_report_end_to_end() {
    let store = paddock_store();
    let report = AggregationEngine::new(&store).session_report("3").unwrap();

    assert_eq!(report.session.vehicle.as_deref(), Some("RSV4"));
    assert_eq!(report.track.as_ref().map(|t| t.name.as_str()), Some("Mugello"));
    assert_eq!(report.laps.len(), 2);
    assert_eq!(report.stats.max_speed, Some(302.6));
    assert_eq!(report.stats.avg_speed, 151.3);
    assert_eq!(report.stats.min_speed, None);
    assert_eq!(report.stats.theoretical_best, 0.0);
}
