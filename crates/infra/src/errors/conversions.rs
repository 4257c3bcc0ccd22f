//! Conversions from external infrastructure errors into domain errors.

use std::time::Duration;

use metricbuf_core::{PipelineError, TransportError};
use metricbuf_domain::MetricbufError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub MetricbufError);

impl From<InfraError> for MetricbufError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<MetricbufError> for InfraError {
    fn from(value: MetricbufError) -> Self {
        InfraError(value)
    }
}

impl From<PipelineError> for InfraError {
    fn from(value: PipelineError) -> Self {
        InfraError(value.into())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → MetricbufError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let mapped = if value.is_builder() {
            MetricbufError::Config(format!("invalid HTTP client configuration: {value}"))
        } else if value.is_timeout() {
            MetricbufError::Network("HTTP request timed out".into())
        } else if value.is_connect() {
            MetricbufError::Network("HTTP connection failure".into())
        } else {
            MetricbufError::Network(value.to_string())
        };
        InfraError(mapped)
    }
}

/// Classify a failed write for the submitter. `timeout` is the client's
/// configured request timeout, reported back on expiry.
pub fn transport_error(err: &HttpError, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_builder() {
        TransportError::Request(err.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

/* -------------------------------------------------------------------------- */
/* Config file parsing → MetricbufError */
/* -------------------------------------------------------------------------- */

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(MetricbufError::Config(format!("failed to read config file: {value}")))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(MetricbufError::Config(format!("invalid JSON format: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(MetricbufError::Config(format!("invalid TOML format: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
