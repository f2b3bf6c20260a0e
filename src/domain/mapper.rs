// Conversion from storage rows to app-domain records

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{GeoPoint, Lap, SECTOR_COUNT, SectorTimes, Session, TelemetryPoint, Track};
use crate::query::Entity;
use crate::store::{Row, StoreError};

/// Storage column names the aggregation queries address directly
pub mod columns {
    pub const ID: &str = "id";
    pub const SESSION_ID: &str = "session_id";
    pub const TRACK_ID: &str = "track_id";
    pub const LAP_NUMBER: &str = "lap_number";
    pub const LAP_TIME: &str = "lap_time";
    pub const MAX_SPEED: &str = "max_speed";
    pub const SPEED: &str = "speed";
}

fn key_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or numeric key, found {}",
            other
        ))),
    }
}

fn optional_key_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string or numeric key, found {}",
            other
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct SessionRow {
    #[serde(deserialize_with = "key_string")]
    id: String,
    #[serde(default, deserialize_with = "optional_key_string")]
    track_id: Option<String>,
    date: Option<String>,
    #[serde(rename = "type")]
    session_type: Option<String>,
    total_laps: Option<i64>,
    best_lap: Option<f64>,
    duration: Option<f64>,
    vehicle: Option<String>,
    data_source: Option<String>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            track_id: row.track_id,
            date: row.date,
            session_type: row.session_type,
            total_laps: row
                .total_laps
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0),
            best_lap_time_seconds: row.best_lap,
            duration_seconds: row.duration,
            vehicle: row.vehicle,
            data_source: row.data_source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LapRow {
    #[serde(deserialize_with = "key_string")]
    id: String,
    #[serde(deserialize_with = "key_string")]
    session_id: String,
    lap_number: i64,
    lap_time: Option<f64>,
    sectors: Option<Vec<Option<f64>>>,
    max_speed: Option<f64>,
    max_lean: Option<f64>,
    g_min: Option<f64>,
    g_max: Option<f64>,
}

impl From<LapRow> for Lap {
    fn from(row: LapRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id,
            lap_number: row.lap_number,
            lap_time_seconds: row.lap_time,
            sectors: sector_slots(row.sectors.as_deref().unwrap_or_default()),
            max_speed_kmh: row.max_speed,
            max_lean_angle: row.max_lean,
            g_force_min: row.g_min,
            g_force_max: row.g_max,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelemetryRow {
    #[serde(deserialize_with = "key_string")]
    session_id: String,
    lap_number: i64,
    record_number: i64,
    timestamp: Option<String>,
    speed: Option<f64>,
    lean: Option<f64>,
    g_x: Option<f64>,
    g_z: Option<f64>,
    gyro_x: Option<f64>,
    gyro_y: Option<f64>,
    gyro_z: Option<f64>,
    alt: Option<f64>,
    location: Option<Value>,
}

impl From<TelemetryRow> for TelemetryPoint {
    fn from(row: TelemetryRow) -> Self {
        Self {
            session_id: row.session_id,
            lap_number: row.lap_number,
            record_number: row.record_number,
            timestamp: row.timestamp,
            speed_kmh: row.speed,
            lean_angle: row.lean,
            g_force_x: row.g_x,
            g_force_z: row.g_z,
            gyro_x: row.gyro_x,
            gyro_y: row.gyro_y,
            gyro_z: row.gyro_z,
            altitude: row.alt,
            position: parse_geo_point(row.location.as_ref()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    #[serde(deserialize_with = "key_string")]
    id: String,
    name: String,
    country: Option<String>,
    length_m: Option<f64>,
    turns: Option<i64>,
    location: Option<Value>,
}

impl From<TrackRow> for Track {
    fn from(row: TrackRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            country: row.country,
            length_meters: row.length_m,
            turns: row.turns.and_then(|n| u32::try_from(n).ok()),
            position: parse_geo_point(row.location.as_ref()),
        }
    }
}

/// Records that can be built from a storage row of a known entity
pub trait FromRow: Sized {
    const ENTITY: Entity;

    fn from_row(row: Row) -> Result<Self, serde_json::Error>;
}

impl FromRow for Session {
    const ENTITY: Entity = Entity::Session;

    fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<SessionRow>(Value::Object(row)).map(Session::from)
    }
}

impl FromRow for Lap {
    const ENTITY: Entity = Entity::Lap;

    fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<LapRow>(Value::Object(row)).map(Lap::from)
    }
}

impl FromRow for TelemetryPoint {
    const ENTITY: Entity = Entity::TelemetryPoint;

    fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<TelemetryRow>(Value::Object(row)).map(TelemetryPoint::from)
    }
}

impl FromRow for Track {
    const ENTITY: Entity = Entity::Track;

    fn from_row(row: Row) -> Result<Self, serde_json::Error> {
        serde_json::from_value::<TrackRow>(Value::Object(row)).map(Track::from)
    }
}

pub fn map_rows<T: FromRow>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| {
            T::from_row(row).map_err(|e| StoreError::Decode {
                table: T::ENTITY.table().to_string(),
                source: e,
            })
        })
        .collect()
}

fn geo_from_object(value: &Value) -> Option<GeoPoint> {
    let lat = value.get("lat")?.as_f64()?;
    let lng = value.get("lng")?.as_f64()?;
    ((-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng))
        .then_some(GeoPoint { lat, lng })
}

/// Parse a geo point stored either as a `{lat, lng}` object or as that object
/// JSON-encoded in a string. Anything else maps to `None`.
pub fn parse_geo_point(value: Option<&Value>) -> Option<GeoPoint> {
    match value? {
        Value::String(encoded) => {
            let decoded: Value = serde_json::from_str(encoded).ok()?;
            decoded.is_object().then(|| geo_from_object(&decoded))?
        }
        object @ Value::Object(_) => geo_from_object(object),
        _ => None,
    }
}

/// Fit a stored sector list into the fixed sector slots, keeping absent values absent
fn sector_slots(stored: &[Option<f64>]) -> SectorTimes {
    let mut slots = [None; SECTOR_COUNT];
    for (slot, value) in slots.iter_mut().zip(stored) {
        *slot = *value;
    }
    slots
}

/// Sector times for display: a missing sector shows as 0.
///
/// Display only. Statistics must not use this, a zero would win every minimum.
pub fn display_sector_times(sectors: &[Option<f64>]) -> [f64; SECTOR_COUNT] {
    let mut display = [0.0; SECTOR_COUNT];
    for (slot, value) in display.iter_mut().zip(sectors) {
        *slot = value.unwrap_or(0.0);
    }
    display
}

/// Lap as shown in a session report
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LapSummary {
    pub id: String,
    pub lap_number: i64,
    pub lap_time_seconds: Option<f64>,
    pub sectors: [f64; SECTOR_COUNT],
    pub max_speed_kmh: Option<f64>,
    pub max_lean_angle: Option<f64>,
}

impl From<&Lap> for LapSummary {
    fn from(lap: &Lap) -> Self {
        Self {
            id: lap.id.clone(),
            lap_number: lap.lap_number,
            lap_time_seconds: lap.lap_time_seconds,
            sectors: display_sector_times(&lap.sectors),
            max_speed_kmh: lap.max_speed_kmh,
            max_lean_angle: lap.max_lean_angle,
        }
    }
}
