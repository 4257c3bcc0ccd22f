//! Web framework integrations

pub mod request_metrics;

pub use request_metrics::{record_request, RequestMetrics, CORRELATION_ID_HEADER};
