// Integration tests for offset and cursor listings

use std::fs;

use paddock::query::cursor::{self, Cursor};
use paddock::query::{PageDefaults, RawParams};
use paddock::store::Row;
use paddock::{
    MemoryStore, PaddockError, QueryFilters, Session, StoreError, TelemetryPoint, Track,
    list_after_cursor, list_entities, list_from_params, normalize_params,
};
use serde_json::{Value, json};
use tempfile::TempDir;

fn rows(values: impl IntoIterator<Item = Value>) -> Vec<Row> {
    values
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
}

fn session_store() -> MemoryStore {
    let sessions = (1..=25).map(|i| {
        let track = if i % 2 == 0 { "spa" } else { "mugello" };
        let vehicle = if i == 7 { "Ducati 100%" } else { "Ducati 1000" };
        json!({
            "id": i,
            "track_id": track,
            "date": format!("2024-05-{:02}", i),
            "vehicle": vehicle,
        })
    });
    MemoryStore::new().with_table("sessions", rows(sessions))
}

fn telemetry_store() -> MemoryStore {
    let seconds = [1, 2, 3, 3, 4, 5, 6];
    let points = seconds.iter().enumerate().map(|(i, s)| {
        json!({
            "session_id": "s1",
            "lap_number": 1,
            "record_number": i + 1,
            "timestamp": format!("2024-05-01T10:00:0{}Z", s),
            "speed": 100.0 + i as f64,
        })
    });
    MemoryStore::new().with_table("telemetry_points", rows(points))
}

#[test]
fn test_offset_listing_last_page() {
    let store = session_store();
    let params = RawParams::new()
        .with("page", "3")
        .with("limit", "10")
        .with("sort", "date")
        .with("dir", "asc");
    let response = list_from_params::<_, Session>(&store, &params, &PageDefaults::default()).unwrap();

    assert_eq!(response.data.len(), 5);
    assert_eq!(response.data[0].id, "21");
    assert_eq!(response.meta.count, 25);
    assert_eq!(response.meta.total_pages, 3);
    assert_eq!(response.meta.next_page, None);

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["meta"]["totalPages"], json!(3));
    assert_eq!(json["meta"]["nextPage"], Value::Null);
    assert_eq!(json["meta"]["dir"], json!("asc"));
}

#[test]
fn test_huge_page_is_empty_with_full_count() {
    let store = session_store();
    let params = RawParams::new().with("page", "1e18").with("limit", "20");
    let response = list_from_params::<_, Session>(&store, &params, &PageDefaults::default()).unwrap();

    assert_eq!(response.meta.page, 1_000_000_000_000_000_000);
    assert!(response.data.is_empty());
    assert_eq!(response.meta.count, 25);
    assert_eq!(response.meta.next_page, None);
}

#[test]
fn test_offset_listing_applies_filters_and_search() {
    let store = session_store();
    let params = RawParams::new()
        .with("query", "track_id:mugello")
        .with("search", "100%");
    let normalized = normalize_params(&params, &PageDefaults::default());
    let response = list_entities::<_, Session>(&store, &normalized.filters, &normalized.options).unwrap();

    // the % in the search term matches literally
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0].id, "7");
    assert_eq!(response.meta.filters.columns["track_id"], vec!["mugello"]);
}

#[test]
fn test_failed_listing_is_distinct_from_empty() {
    let store = session_store();
    let filters = QueryFilters::new().with_column("track_id", &["portimao"]);
    let empty = list_entities::<_, Session>(&store, &filters, &Default::default()).unwrap();
    assert!(empty.data.is_empty());
    assert_eq!(empty.meta.count, 0);

    let failed = list_entities::<_, Track>(&store, &QueryFilters::new(), &Default::default());
    assert!(matches!(
        failed,
        Err(PaddockError::Store {
            source: StoreError::UnknownTable { .. }
        })
    ));
}

#[test]
fn test_cursor_pages_cover_collection_once() {
    let store = telemetry_store();
    let filters = QueryFilters::new();
    let mut seen = Vec::new();
    let mut token: Option<String> = None;
    let mut pages = 0;

    loop {
        let page = list_after_cursor::<_, TelemetryPoint>(&store, &filters, token.as_deref(), 3)
            .unwrap();
        pages += 1;
        seen.extend(page.data.iter().map(|p| p.record_number));
        match page.next_cursor {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen, vec![7, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn test_cursor_points_at_last_row_of_page() {
    let store = telemetry_store();
    let page = list_after_cursor::<_, TelemetryPoint>(&store, &QueryFilters::new(), None, 4).unwrap();
    let next = cursor::decode(page.next_cursor.as_deref()).unwrap();
    assert_eq!(next, Cursor::new("2024-05-01T10:00:03Z", "4"));
}

#[test]
fn test_undecodable_cursor_starts_from_the_top() {
    let store = telemetry_store();
    let filters = QueryFilters::new();
    let first = list_after_cursor::<_, TelemetryPoint>(&store, &filters, None, 2).unwrap();
    for garbage in ["", "not a cursor", "eyJ0IjoiIn0"] {
        let page = list_after_cursor::<_, TelemetryPoint>(&store, &filters, Some(garbage), 2).unwrap();
        assert_eq!(page, first, "{}", garbage);
    }
}

#[test]
fn test_load_tables_from_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("tracks.jsonl"),
        concat!(
            "{\"id\": 1, \"name\": \"Spa-Francorchamps\", \"location\": \"{\\\"lat\\\": 50.44, \\\"lng\\\": 5.97}\"}\n",
            "{\"id\": 2, \"name\": \"Mugello\", \"turns\": 15}\n",
        ),
    )
    .unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    let store = MemoryStore::from_dir(temp_dir.path()).unwrap();
    assert_eq!(store.table_names(), vec!["tracks"]);

    let params = RawParams::new().with("search", "spa").with("limit", "5");
    let tracks = list_from_params::<_, Track>(&store, &params, &PageDefaults::default()).unwrap();
    assert_eq!(tracks.data.len(), 1);
    assert!(tracks.data[0].position.is_some());
    assert_eq!(tracks.meta.limit, 5);
}
