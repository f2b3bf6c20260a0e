// Aggregation engine: counts, lap lookups and derived session statistics

pub mod cache;
pub mod derived;

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use tokio::runtime::{Builder, Runtime};
use tokio::task::{JoinError, JoinHandle};

pub use cache::RequestCache;
pub use derived::{SessionStats, best_sector_times, session_derived_stats, theoretical_best};

use crate::PaddockError;
use crate::domain::mapper::columns;
use crate::domain::{Lap, LapSummary, Session, Track, map_rows};
use crate::query::{Entity, QueryFilters, apply_filters};
use crate::store::{CountMode, QueryBuilder, RowStore, StoreError};
use cache::CachedValue;

/// Lap numbers below this are untimed (0 marks out-laps and pit telemetry)
const FIRST_TIMED_LAP: &str = "1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregateOperation {
    CountEntities(Entity),
    BestLap,
    TopSpeed,
    MinSessionSpeed,
}

impl fmt::Display for AggregateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateOperation::CountEntities(entity) => write!(f, "count of {}", entity.table()),
            AggregateOperation::BestLap => f.write_str("best lap"),
            AggregateOperation::TopSpeed => f.write_str("top speed"),
            AggregateOperation::MinSessionSpeed => f.write_str("minimum session speed"),
        }
    }
}

fn aggregation_error(operation: AggregateOperation) -> impl FnOnce(StoreError) -> PaddockError {
    move |source| PaddockError::Aggregation { operation, source }
}

/// One metric of a composite response. A failed metric is reported as unavailable
/// instead of failing its siblings, and stays distinguishable from an empty result.
#[derive(Clone, Debug, PartialEq)]
pub enum Metric<T> {
    Available(T),
    Unavailable,
}

impl<T> Metric<T> {
    pub fn from_result(result: Result<T, PaddockError>) -> Self {
        match result {
            Ok(value) => Metric::Available(value),
            Err(e) => {
                match std::error::Error::source(&e) {
                    Some(cause) => warn!("{}: {}, reporting as unavailable", e, cause),
                    None => warn!("{}, reporting as unavailable", e),
                }
                Metric::Unavailable
            }
        }
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Metric::Available(value) => Some(value),
            Metric::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Available(_))
    }
}

impl<T: Serialize> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Available(value) => value.serialize(serializer),
            Metric::Unavailable => serializer.serialize_str("unavailable"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAggregate {
    pub total_sessions: Metric<u64>,
    pub total_laps: Metric<u64>,
    pub best_lap: Metric<Option<Lap>>,
    pub top_speed: Metric<Option<Lap>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub session: Session,
    pub track: Option<Track>,
    pub laps: Vec<LapSummary>,
    pub stats: SessionStats,
}

/// Read-only aggregate queries over a store.
///
/// Every operation is a single query followed by a pure computation, so any of them
/// can be retried or abandoned freely. Retries are left to the caller.
pub struct AggregationEngine<'a, S: RowStore> {
    store: &'a S,
    cache: Option<&'a RequestCache>,
}

impl<'a, S: RowStore> AggregationEngine<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store, cache: None }
    }

    /// Deduplicate identical queries through a cache scoped to the current request
    pub fn with_cache(mut self, cache: Option<&'a RequestCache>) -> Self {
        self.cache = cache;
        self
    }

    fn cached<T: Clone>(
        &self,
        key: String,
        wrap: fn(T) -> CachedValue,
        unwrap: fn(CachedValue) -> Option<T>,
        compute: impl FnOnce() -> Result<T, PaddockError>,
    ) -> Result<T, PaddockError> {
        let Some(cache) = self.cache else {
            return compute();
        };
        if let Some(value) = cache.get(&key).and_then(unwrap) {
            return Ok(value);
        }
        let value = compute()?;
        cache.insert(key, wrap(value.clone()));
        Ok(value)
    }

    /// Number of rows of `entity` matching `filters`, without fetching any of them
    pub fn count_entities(&self, entity: Entity, filters: &QueryFilters) -> Result<u64, PaddockError> {
        let key = format!("count:{}:{}", entity.table(), filters.cache_key());
        self.cached(
            key,
            CachedValue::Count,
            |v| match v {
                CachedValue::Count(n) => Some(n),
                _ => None,
            },
            || {
                let query = self
                    .store
                    .select(entity.table(), columns::ID, CountMode::Head);
                let response = apply_filters(query, filters, &entity.into())
                    .execute()
                    .map_err(aggregation_error(AggregateOperation::CountEntities(entity)))?;
                let count = response.count.unwrap_or(0);
                debug!("Counted {} {} rows", count, entity.table());
                Ok(count)
            },
        )
    }

    /// Whether any row of `entity` matches. Existence checks degrade to `false` when the
    /// count query fails instead of failing the caller.
    pub fn entity_exists(&self, entity: Entity, filters: &QueryFilters) -> bool {
        match self.count_entities(entity, filters) {
            Ok(count) => count > 0,
            Err(e) => {
                warn!("{}, treating as no {} rows", e, entity.table());
                false
            }
        }
    }

    pub fn track_count(&self, filters: &QueryFilters) -> Result<u64, PaddockError> {
        self.count_entities(Entity::Track, filters)
    }

    /// First timed lap ordered by `column`, ties going to the smallest lap id
    fn extreme_lap(
        &self,
        operation: AggregateOperation,
        column: &str,
        ascending: bool,
        filters: &QueryFilters,
    ) -> Result<Option<Lap>, PaddockError> {
        let key = format!("{}:{}", operation, filters.cache_key());
        self.cached(
            key,
            CachedValue::Lap,
            |v| match v {
                CachedValue::Lap(lap) => Some(lap),
                _ => None,
            },
            || {
                let query = self.store.select(Entity::Lap.table(), "*", CountMode::None);
                let response = apply_filters(query, filters, &Entity::Lap.into())
                    .gte(columns::LAP_NUMBER, FIRST_TIMED_LAP)
                    .order(column, ascending)
                    .order(columns::ID, true)
                    .limit(1)
                    .execute()
                    .map_err(aggregation_error(operation))?;
                let lap = map_rows::<Lap>(response.data)
                    .map_err(aggregation_error(operation))?
                    .into_iter()
                    .next();
                Ok(lap)
            },
        )
    }

    /// Timed lap with the lowest lap time
    pub fn best_lap(&self, filters: &QueryFilters) -> Result<Option<Lap>, PaddockError> {
        let lap = self.extreme_lap(AggregateOperation::BestLap, columns::LAP_TIME, true, filters)?;
        // NULLs sort last, so a NULL here means no lap had a time at all
        Ok(lap.filter(|l| l.lap_time_seconds.is_some()))
    }

    /// Timed lap with the highest top speed
    pub fn top_speed(&self, filters: &QueryFilters) -> Result<Option<Lap>, PaddockError> {
        let lap = self.extreme_lap(AggregateOperation::TopSpeed, columns::MAX_SPEED, false, filters)?;
        Ok(lap.filter(|l| l.max_speed_kmh.is_some()))
    }

    /// Lowest telemetry speed recorded in a session
    pub fn min_session_speed(&self, session_id: &str) -> Result<Option<f64>, PaddockError> {
        let operation = AggregateOperation::MinSessionSpeed;
        self.cached(
            format!("{}:{}", operation, session_id),
            CachedValue::Speed,
            |v| match v {
                CachedValue::Speed(speed) => Some(speed),
                _ => None,
            },
            || {
                let response = self
                    .store
                    .select(Entity::TelemetryPoint.table(), columns::SPEED, CountMode::None)
                    .eq(columns::SESSION_ID, session_id)
                    .order(columns::SPEED, true)
                    .limit(1)
                    .execute()
                    .map_err(aggregation_error(operation))?;
                Ok(response
                    .data
                    .first()
                    .and_then(|row| row.get(columns::SPEED))
                    .and_then(|speed| speed.as_f64()))
            },
        )
    }

    /// Headline numbers for a filtered set of sessions.
    ///
    /// The four metrics are independent queries built from the same filters; one failing
    /// leaves the others intact.
    pub fn dashboard_aggregate(&self, filters: &QueryFilters) -> DashboardAggregate {
        DashboardAggregate {
            total_sessions: Metric::from_result(self.count_entities(Entity::Session, filters)),
            total_laps: Metric::from_result(self.count_entities(Entity::Lap, filters)),
            best_lap: Metric::from_result(self.best_lap(filters)),
            top_speed: Metric::from_result(self.top_speed(filters)),
        }
    }

    pub fn session_report(&self, session_id: &str) -> Result<SessionReport, PaddockError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(PaddockError::Validation {
                field: "session_id".to_string(),
                reason: "Session id cannot be empty".to_string(),
            });
        }

        let response = self
            .store
            .select(Entity::Session.table(), "*", CountMode::None)
            .eq(columns::ID, session_id)
            .single()
            .execute()?;
        let session = map_rows::<Session>(response.data)?
            .into_iter()
            .next()
            .ok_or_else(|| PaddockError::NotFound {
                entity: Entity::Session.to_string(),
                key: session_id.to_string(),
            })?;

        let track = match session.track_id.as_deref() {
            Some(track_id) => {
                let response = self
                    .store
                    .select(Entity::Track.table(), "*", CountMode::None)
                    .eq(columns::ID, track_id)
                    .single()
                    .execute()?;
                let track = map_rows::<Track>(response.data)?.into_iter().next();
                if track.is_none() {
                    warn!("Session {} references missing track {}", session.id, track_id);
                }
                track
            }
            None => None,
        };

        let response = self
            .store
            .select(Entity::Lap.table(), "*", CountMode::None)
            .eq(columns::SESSION_ID, session_id)
            .order(columns::LAP_NUMBER, true)
            .execute()?;
        let laps = map_rows::<Lap>(response.data)?;

        let min_speed = self.min_session_speed(session_id)?;
        let stats = session_derived_stats(&session, &laps, min_speed);
        info!(
            "Built report for session {} with {} laps",
            session.id,
            laps.len()
        );

        Ok(SessionReport {
            laps: laps.iter().map(LapSummary::from).collect(),
            session,
            track,
            stats,
        })
    }
}

fn spawn_metric<S, T, F>(
    runtime: &Runtime,
    store: &Arc<S>,
    cache: &Option<Arc<RequestCache>>,
    run: F,
) -> JoinHandle<Metric<T>>
where
    S: RowStore + Send + Sync + 'static,
    T: Send + 'static,
    F: FnOnce(&AggregationEngine<'_, S>) -> Result<T, PaddockError> + Send + 'static,
{
    let store = Arc::clone(store);
    let cache = cache.clone();
    runtime.spawn_blocking(move || {
        let engine = AggregationEngine::new(store.as_ref()).with_cache(cache.as_deref());
        Metric::from_result(run(&engine))
    })
}

fn joined<T>(name: &str, result: Result<Metric<T>, JoinError>) -> Metric<T> {
    result.unwrap_or_else(|e| {
        warn!("{} query did not complete: {}, reporting as unavailable", name, e);
        Metric::Unavailable
    })
}

/// Same result as [`AggregationEngine::dashboard_aggregate`], with the four queries
/// issued concurrently on a blocking pool
pub fn dashboard_aggregate_concurrent<S>(
    store: Arc<S>,
    filters: &QueryFilters,
    cache: Option<Arc<RequestCache>>,
) -> Result<DashboardAggregate, PaddockError>
where
    S: RowStore + Send + Sync + 'static,
{
    let runtime = Builder::new_current_thread()
        .build()
        .map_err(|e| PaddockError::Runtime { source: e })?;

    let sessions = {
        let filters = filters.clone();
        spawn_metric(&runtime, &store, &cache, move |engine| {
            engine.count_entities(Entity::Session, &filters)
        })
    };
    let laps = {
        let filters = filters.clone();
        spawn_metric(&runtime, &store, &cache, move |engine| {
            engine.count_entities(Entity::Lap, &filters)
        })
    };
    let best_lap = {
        let filters = filters.clone();
        spawn_metric(&runtime, &store, &cache, move |engine| engine.best_lap(&filters))
    };
    let top_speed = {
        let filters = filters.clone();
        spawn_metric(&runtime, &store, &cache, move |engine| engine.top_speed(&filters))
    };

    Ok(runtime.block_on(async move {
        DashboardAggregate {
            total_sessions: joined("session count", sessions.await),
            total_laps: joined("lap count", laps.await),
            best_lap: joined("best lap", best_lap.await),
            top_speed: joined("top speed", top_speed.await),
        }
    }))
}
