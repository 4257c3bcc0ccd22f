//! Default request instrumentation

use metricbuf_domain::Measurement;

use super::ports::{RequestInfo, RequestInstrumentation, ResponseInfo};

/// Measurement name used when the service does not pick one
pub const DEFAULT_REQUEST_MEASUREMENT: &str = "request";

/// Tags `handler`, `method`, `endpoint`, `correlation_id`, `status_code` and
/// `remote_ip`; records `content_length` (integer) and `duration` (seconds).
#[derive(Debug, Clone)]
pub struct DefaultRequestInstrumentation {
    database: String,
    measurement: String,
}

impl DefaultRequestInstrumentation {
    pub fn new(database: impl Into<String>) -> Self {
        Self { database: database.into(), measurement: DEFAULT_REQUEST_MEASUREMENT.to_string() }
    }

    /// Override the measurement name, usually with the service name.
    pub fn with_measurement(mut self, name: impl Into<String>) -> Self {
        self.measurement = name.into();
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl RequestInstrumentation for DefaultRequestInstrumentation {
    fn start(&self, request: &RequestInfo) -> Measurement {
        let mut measurement = Measurement::new(&self.database, &self.measurement);
        measurement.set_tag("handler", &request.handler).set_tag("method", &request.method);
        if let Some(endpoint) = &request.endpoint {
            measurement.set_tag("endpoint", endpoint);
        }
        if let Some(correlation_id) = &request.correlation_id {
            measurement.set_tag("correlation_id", correlation_id);
        }
        if let Some(remote_ip) = &request.remote_ip {
            measurement.set_tag("remote_ip", remote_ip);
        }
        measurement
    }

    fn finish(&self, measurement: &mut Measurement, response: &ResponseInfo) {
        let content_length = i64::try_from(response.content_length).unwrap_or(i64::MAX);
        measurement
            .set_field("content_length", content_length)
            .set_field("duration", response.elapsed.as_secs_f64())
            .set_tag("status_code", response.status.to_string());
        if let Some(remote_ip) = &response.remote_ip {
            measurement.set_tag("remote_ip", remote_ip);
        }
    }
}
