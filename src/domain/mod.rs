// App-domain shapes of the records the query layer reads

pub mod mapper;

use serde::{Deserialize, Serialize};

pub use mapper::{FromRow, LapSummary, display_sector_times, map_rows, parse_geo_point};

/// Number of timed sectors in a lap
pub const SECTOR_COUNT: usize = 3;

/// Sector times in track order, a sector may not have been recorded
pub type SectorTimes = [Option<f64>; SECTOR_COUNT];

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub track_id: Option<String>,
    pub date: Option<String>,
    pub session_type: Option<String>,
    pub total_laps: u32,
    pub best_lap_time_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub vehicle: Option<String>,
    pub data_source: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub id: String,
    pub session_id: String,
    /// 0 marks an out-lap or other untimed telemetry
    pub lap_number: i64,
    pub lap_time_seconds: Option<f64>,
    pub sectors: SectorTimes,
    pub max_speed_kmh: Option<f64>,
    pub max_lean_angle: Option<f64>,
    pub g_force_min: Option<f64>,
    pub g_force_max: Option<f64>,
}

impl Lap {
    pub fn is_timed(&self) -> bool {
        self.lap_number != 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPoint {
    pub session_id: String,
    pub lap_number: i64,
    pub record_number: i64,
    pub timestamp: Option<String>,
    pub speed_kmh: Option<f64>,
    pub lean_angle: Option<f64>,
    pub g_force_x: Option<f64>,
    pub g_force_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    pub gyro_z: Option<f64>,
    pub altitude: Option<f64>,
    pub position: Option<GeoPoint>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub country: Option<String>,
    pub length_meters: Option<f64>,
    pub turns: Option<u32>,
    pub position: Option<GeoPoint>,
}
