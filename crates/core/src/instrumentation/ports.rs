//! Port interfaces for request instrumentation

use std::time::Duration;

use metricbuf_domain::Measurement;

/// What is known about a request when it arrives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    /// Name of the handler serving the request
    pub handler: String,
    pub method: String,
    /// Matched route pattern, if the router exposes one
    pub endpoint: Option<String>,
    pub correlation_id: Option<String>,
    pub remote_ip: Option<String>,
}

/// What is known once the response is ready
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    pub status: u16,
    /// Response `Content-Length`, zero when absent
    pub content_length: u64,
    /// Time spent handling the request
    pub elapsed: Duration,
    /// Client address, when only known after the request was handled
    pub remote_ip: Option<String>,
}

/// Trait for turning one request/response pair into one measurement
pub trait RequestInstrumentation: Send + Sync {
    /// Create and tag the measurement for an incoming request.
    fn start(&self, request: &RequestInfo) -> Measurement;

    /// Record response-derived tags and fields.
    fn finish(&self, measurement: &mut Measurement, response: &ResponseInfo);
}
