use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The read-only record kinds the query layer knows how to address
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Session,
    Lap,
    TelemetryPoint,
    Track,
}

impl Entity {
    pub const ALL: [Entity; 4] = [
        Entity::Session,
        Entity::Lap,
        Entity::TelemetryPoint,
        Entity::Track,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Entity::Session => "sessions",
            Entity::Lap => "laps",
            Entity::TelemetryPoint => "telemetry_points",
            Entity::Track => "tracks",
        }
    }

    /// Column the `from`/`to` range bounds and cursors are applied to.
    ///
    /// Laps carry their session's `date` so session-scoped filters narrow sessions and
    /// laps identically.
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Entity::Session | Entity::Lap => "date",
            Entity::TelemetryPoint => "timestamp",
            Entity::Track => "created_at",
        }
    }

    /// Column free-text `search` is matched against, if the entity supports it
    pub fn search_column(&self) -> Option<&'static str> {
        match self {
            Entity::Session | Entity::Lap => Some("vehicle"),
            Entity::Track => Some("name"),
            Entity::TelemetryPoint => None,
        }
    }

    /// Unique, orderable key used as the cursor tie-breaker
    pub fn key_column(&self) -> &'static str {
        match self {
            Entity::TelemetryPoint => "record_number",
            _ => "id",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Entity::Session => "session",
            Entity::Lap => "lap",
            Entity::TelemetryPoint => "telemetry_point",
            Entity::Track => "track",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Entity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Entity::ALL
            .into_iter()
            .find(|e| e.name() == normalized || e.table() == normalized)
            .ok_or_else(|| format!("unknown entity '{}'", s))
    }
}
