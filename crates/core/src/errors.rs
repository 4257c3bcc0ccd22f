//! Errors reported synchronously by the pipeline's public operations
//!
//! Per-measurement and per-batch failures never surface here; they are
//! logged and counted instead.

use metricbuf_domain::{ConfigError, MetricbufError};
use thiserror::Error;

/// Wrong-state calls and configuration rejected at install time
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    #[error("pipeline is not installed")]
    NotInstalled,

    #[error("pipeline is already installed")]
    AlreadyInstalled,

    #[error("pipeline must be installed from within a tokio runtime")]
    NoRuntime,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl From<PipelineError> for MetricbufError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Config(inner) => inner.into(),
            other => MetricbufError::InvalidState(other.to_string()),
        }
    }
}

/// Result type alias for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
