//! Request metrics middleware for axum
//!
//! Records one measurement per request through a
//! [`RequestInstrumentation`] and hands it to a [`MetricsPipeline`].
//!
//! The client address comes from the connection. `X-Forwarded-For` is only
//! read once [`RequestMetrics::trust_forwarded_for`] is enabled, for services
//! behind a proxy that sets it.
//!
//! ```no_run
//! use axum::{middleware, routing::get, Router};
//! use metricbuf_core::MetricsPipeline;
//! use metricbuf_infra::integrations::{record_request, RequestMetrics};
//!
//! # fn router(pipeline: MetricsPipeline) -> Router {
//! let metrics = RequestMetrics::for_database(pipeline, "requests");
//! Router::new()
//!     .route("/orders/{id}", get(|| async { "ok" }))
//!     .layer(middleware::from_fn_with_state(metrics, record_request))
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::HttpBody;
use axum::extract::{ConnectInfo, MatchedPath, Request, State};
use axum::http::header::CONTENT_LENGTH;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use metricbuf_core::{
    DefaultRequestInstrumentation, MetricsPipeline, RequestInfo, RequestInstrumentation,
    ResponseInfo,
};
use tracing::debug;

/// Header carrying the caller's correlation id
pub const CORRELATION_ID_HEADER: &str = "correlation-id";

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const UNMATCHED_HANDLER: &str = "unmatched";

/// Middleware state: the pipeline plus how requests become measurements
#[derive(Clone)]
pub struct RequestMetrics {
    pipeline: MetricsPipeline,
    instrumentation: Arc<dyn RequestInstrumentation>,
    handler: Option<String>,
    trust_forwarded_for: bool,
}

impl RequestMetrics {
    pub fn new(pipeline: MetricsPipeline, instrumentation: Arc<dyn RequestInstrumentation>) -> Self {
        Self { pipeline, instrumentation, handler: None, trust_forwarded_for: false }
    }

    /// Use [`DefaultRequestInstrumentation`] writing to `database`.
    pub fn for_database(pipeline: MetricsPipeline, database: impl Into<String>) -> Self {
        Self::new(pipeline, Arc::new(DefaultRequestInstrumentation::new(database)))
    }

    /// Fixed `handler` tag. Defaults to the matched route pattern.
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }

    /// Take `remote_ip` from the first `X-Forwarded-For` hop. Off by default
    /// since clients can set the header themselves.
    pub fn trust_forwarded_for(mut self, enabled: bool) -> Self {
        self.trust_forwarded_for = enabled;
        self
    }

    fn request_info(&self, request: &Request) -> RequestInfo {
        let endpoint = request.extensions().get::<MatchedPath>().map(|path| path.as_str().to_string());
        let handler = self
            .handler
            .clone()
            .or_else(|| endpoint.clone())
            .unwrap_or_else(|| UNMATCHED_HANDLER.to_string());
        let forwarded =
            self.trust_forwarded_for.then(|| forwarded_for(request.headers())).flatten();
        let remote_ip = forwarded.or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });

        RequestInfo {
            handler,
            method: request.method().as_str().to_string(),
            endpoint,
            correlation_id: header_value(request.headers(), CORRELATION_ID_HEADER),
            remote_ip,
        }
    }
}

impl std::fmt::Debug for RequestMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestMetrics")
            .field("handler", &self.handler)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .finish_non_exhaustive()
    }
}

/// Middleware for [`axum::middleware::from_fn_with_state`].
///
/// The response is passed through untouched; a measurement that cannot be
/// recorded is logged at debug level.
pub async fn record_request(
    State(metrics): State<RequestMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let mut measurement = metrics.instrumentation.start(&metrics.request_info(&request));

    let response = next.run(request).await;

    let info = ResponseInfo {
        status: response.status().as_u16(),
        content_length: content_length(&response),
        elapsed: started.elapsed(),
        remote_ip: None,
    };
    metrics.instrumentation.finish(&mut measurement, &info);

    if let Err(err) = metrics.pipeline.add_measurement(measurement) {
        debug!(error = %err, "Request measurement not recorded");
    }
    response
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// First hop in `X-Forwarded-For`.
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_value(headers, FORWARDED_FOR_HEADER)
        .and_then(|value| value.split(',').next().map(|hop| hop.trim().to_string()))
        .filter(|hop| !hop.is_empty())
}

fn content_length(response: &Response) -> u64 {
    header_value(response.headers(), CONTENT_LENGTH.as_str())
        .and_then(|value| value.parse().ok())
        .or_else(|| response.body().size_hint().exact())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use metricbuf_core::{LineWriter, TransportError, WriteResponse};
    use metricbuf_domain::PipelineConfig;
    use parking_lot::Mutex;
    use tower::ServiceExt;

    use super::*;

    #[derive(Default)]
    struct CapturingWriter {
        bodies: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LineWriter for CapturingWriter {
        async fn write(&self, _database: &str, body: String) -> Result<WriteResponse, TransportError> {
            self.bodies.lock().push(body);
            Ok(WriteResponse::new(204, ""))
        }
    }

    fn config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.set_tag_hostname(false);
        config.set_interval_ms(60_000).unwrap();
        config
    }

    fn app(metrics: RequestMetrics) -> Router {
        Router::new()
            .route("/orders/{id}", get(|| async { "hello" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn_with_state(metrics, record_request))
    }

    #[tokio::test]
    async fn records_one_measurement_per_request() {
        let writer = Arc::new(CapturingWriter::default());
        let pipeline = MetricsPipeline::new(writer.clone());
        pipeline.install(config()).unwrap();

        let request = Request::builder()
            .uri("/orders/7")
            .header(CORRELATION_ID_HEADER, "abc")
            .header(FORWARDED_FOR_HEADER, "10.0.0.1, 10.0.0.2")
            .body(Body::empty())
            .unwrap();
        let metrics =
            RequestMetrics::for_database(pipeline.clone(), "web").trust_forwarded_for(true);
        let response = app(metrics).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(pipeline.buffered(), 1);

        pipeline.flush().await.unwrap();
        let bodies = writer.bodies.lock().clone();
        assert_eq!(bodies.len(), 1);
        let line = &bodies[0];
        assert!(
            line.starts_with(
                "request,correlation_id=abc,endpoint=/orders/{id},handler=/orders/{id},\
                 method=GET,remote_ip=10.0.0.1,status_code=200 content_length=5i,duration="
            ),
            "{line}"
        );
    }

    #[tokio::test]
    async fn fixed_handler_and_error_status_are_tagged() {
        let writer = Arc::new(CapturingWriter::default());
        let pipeline = MetricsPipeline::new(writer.clone());
        pipeline.install(config()).unwrap();

        let metrics = RequestMetrics::for_database(pipeline.clone(), "web").with_handler("billing");
        let request = Request::builder().uri("/missing").body(Body::empty()).unwrap();
        let response = app(metrics).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        pipeline.flush().await.unwrap();
        let line = writer.bodies.lock()[0].clone();
        assert!(line.contains("handler=billing"), "{line}");
        assert!(line.contains("status_code=404"), "{line}");
        assert!(!line.contains("correlation_id"), "{line}");
    }

    #[tokio::test]
    async fn forwarded_for_is_ignored_unless_trusted() {
        let writer = Arc::new(CapturingWriter::default());
        let pipeline = MetricsPipeline::new(writer.clone());
        pipeline.install(config()).unwrap();

        let request = Request::builder()
            .uri("/orders/3")
            .header(FORWARDED_FOR_HEADER, "203.0.113.9")
            .body(Body::empty())
            .unwrap();
        app(RequestMetrics::for_database(pipeline.clone(), "web"))
            .oneshot(request)
            .await
            .unwrap();

        pipeline.flush().await.unwrap();
        let line = writer.bodies.lock()[0].clone();
        assert!(!line.contains("remote_ip"), "{line}");
        assert!(!line.contains("203.0.113.9"), "{line}");
    }

    #[tokio::test]
    async fn uninstalled_pipeline_does_not_break_responses() {
        let pipeline = MetricsPipeline::new(Arc::new(CapturingWriter::default()));

        let request = Request::builder().uri("/orders/1").body(Body::empty()).unwrap();
        let response = app(RequestMetrics::for_database(pipeline.clone(), "web"))
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(pipeline.buffered(), 0);
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(FORWARDED_FOR_HEADER, " 192.0.2.4 ,10.0.0.1".parse().unwrap());
        assert_eq!(forwarded_for(&headers).as_deref(), Some("192.0.2.4"));

        headers.insert(FORWARDED_FOR_HEADER, ",".parse().unwrap());
        assert_eq!(forwarded_for(&headers), None);
    }
}
