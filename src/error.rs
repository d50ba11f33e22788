//! Error types
//!
//! Only loading and validation can fail. Once a run starts, anomalies are normalized
//! in place instead of surfacing as errors.

/// Errors raised while loading a replay recording
#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    /// The replay file could not be read
    #[error("failed to read replay: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON, or an event missing a required field
    #[error("malformed replay: {0}")]
    Json(#[from] serde_json::Error),

    /// An event timestamp is NaN or infinite
    #[error("replay event {index} has a non-finite time")]
    NonFiniteTime { index: usize },

    /// Events are not sorted by time
    #[error("replay event {index} at t={time} precedes previous event at t={previous}")]
    OutOfOrder {
        index: usize,
        time: f64,
        previous: f64,
    },
}

/// Errors raised while loading or validating settings
#[derive(thiserror::Error, Debug)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is outside the range the engine can simulate
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Errors that stop a simulation before its first tick
#[derive(thiserror::Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
