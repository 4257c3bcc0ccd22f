//! Error types used throughout the pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for metricbuf
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum MetricbufError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for metricbuf operations
pub type Result<T> = std::result::Result<T, MetricbufError>;

/// Invalid configuration value rejected by a setter or by validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("sample_probability must be within [0, 1], got {0}")]
    SampleProbabilityOutOfRange(f64),

    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },

    #[error("unsupported scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("host must not be empty")]
    EmptyHost,

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl From<ConfigError> for MetricbufError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// A measurement that cannot be rendered as line protocol.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("measurement '{name}' has no fields")]
    NoFields { name: String },

    #[error("measurement name is empty")]
    EmptyName,

    #[error("field '{field}' of measurement '{name}' is not a finite number")]
    NonFiniteFloat { name: String, field: String },

    #[error("measurement '{name}' has an empty tag or field key")]
    EmptyKey { name: String },

    #[error("measurement '{name}' contains a line break outside a string field")]
    LineBreak { name: String },
}

impl From<EncodingError> for MetricbufError {
    fn from(err: EncodingError) -> Self {
        Self::Encoding(err.to_string())
    }
}

/// Why a measurement was refused at the buffer boundary.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("submission is disabled")]
    Disabled,

    #[error("pipeline is shutting down")]
    Stopping,

    #[error("buffer is full ({limit} measurements)")]
    BufferFull { limit: usize },

    #[error("measurement has no destination database")]
    EmptyDatabase,
}

impl AdmissionError {
    /// Short label used for log fields and discard counters.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Stopping => "stopping",
            Self::BufferFull { .. } => "buffer_full",
            Self::EmptyDatabase => "empty_database",
        }
    }
}
