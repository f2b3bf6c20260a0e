// Per-session statistics derived from already-fetched laps

use log::debug;
use serde::Serialize;

use crate::domain::{Lap, SECTOR_COUNT, SectorTimes, Session};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Mean of every lap's top speed, laps without one count as 0
    pub avg_speed: f64,
    pub min_speed: Option<f64>,
    pub max_speed: Option<f64>,
    pub max_lean_angle: Option<f64>,
    pub theoretical_best: f64,
}

/// Fastest recorded time for each sector.
///
/// Laps without a value for a sector are left out of that sector's minimum; a sector
/// nobody recorded stays `None`.
pub fn best_sector_times(laps: &[Lap]) -> SectorTimes {
    let mut best = [None; SECTOR_COUNT];
    for (index, slot) in best.iter_mut().enumerate() {
        *slot = laps
            .iter()
            .filter_map(|lap| lap.sectors[index])
            .reduce(f64::min);
    }
    best
}

/// Sum of the best sector times, an unrecorded sector adds 0
pub fn theoretical_best(laps: &[Lap]) -> f64 {
    best_sector_times(laps)
        .iter()
        .map(|sector| sector.unwrap_or(0.0))
        .sum()
}

fn max_observed(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    values.flatten().reduce(f64::max)
}

/// Derive the session statistics from its laps and the caller-supplied minimum
/// telemetry speed
pub fn session_derived_stats(session: &Session, laps: &[Lap], min_speed: Option<f64>) -> SessionStats {
    debug!(
        "Deriving statistics for session {} over {} laps",
        session.id,
        laps.len()
    );
    let avg_speed = if laps.is_empty() {
        0.0
    } else {
        laps.iter()
            .map(|lap| lap.max_speed_kmh.unwrap_or(0.0))
            .sum::<f64>()
            / laps.len() as f64
    };

    SessionStats {
        avg_speed,
        min_speed,
        max_speed: max_observed(laps.iter().map(|lap| lap.max_speed_kmh)),
        max_lean_angle: max_observed(laps.iter().map(|lap| lap.max_lean_angle)),
        theoretical_best: theoretical_best(laps),
    }
}
