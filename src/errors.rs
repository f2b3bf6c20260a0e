// Error types for paddock

use crate::stats::AggregateOperation;
use crate::store::StoreError;
use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum PaddockError {
    // Request errors
    #[snafu(display("Invalid request parameter: {field} - {reason}"))]
    Validation { field: String, reason: String },
    #[snafu(display("No {entity} found for {key}"))]
    NotFound { entity: String, key: String },

    // Errors raised while querying the store
    #[snafu(display("Store query failed"))]
    Store { source: StoreError },
    #[snafu(display("Aggregation {operation} failed"))]
    Aggregation {
        operation: AggregateOperation,
        source: StoreError,
    },
    #[snafu(display("Error starting query fan-out runtime"))]
    Runtime { source: io::Error },

    // Data loading errors
    #[snafu(display("Error loading table data from {path}"))]
    TableLoad { path: String, source: io::Error },

    // CLI errors
    #[snafu(display("Error rendering output"))]
    Output { source: serde_json::Error },

    // Config management errors
    #[snafu(display("Could not find application config directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIO { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerialize { source: serde_json::Error },
}

impl From<StoreError> for PaddockError {
    fn from(value: StoreError) -> Self {
        PaddockError::Store { source: value }
    }
}
