//! End-to-end tests: pipeline → HTTP writer → mock write endpoint
//!
//! **Coverage:**
//! - Shutdown drains every buffered measurement in batches
//! - Rejected batches fall back to per-line writes
//! - Basic auth and base tags reach the wire
//! - An unreachable endpoint drops the batch without retrying

use metricbuf_domain::{Measurement, PipelineConfig};
use metricbuf_infra::bootstrap;
use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn config_for(server: &MockServer) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.set_scheme("http").unwrap();
    config.set_host(&server.address().ip().to_string()).unwrap();
    config.set_port(server.address().port()).unwrap();
    config.set_tag_hostname(false);
    config.set_interval_ms(60_000).unwrap();
    config
}

fn point(seq: i64) -> Measurement {
    Measurement::new("app", "jobs").with_tag("queue", "default").with_field("seq", seq)
}

fn seqs(bodies: &[String]) -> Vec<i64> {
    bodies
        .iter()
        .flat_map(|body| body.lines())
        .map(|line| {
            let start = line.find("seq=").expect("seq field") + 4;
            let end = line[start..].find('i').expect("integer suffix") + start;
            line[start..end].parse().expect("sequence number")
        })
        .collect()
}

async fn bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|request| String::from_utf8(request.body).expect("utf-8 body"))
        .collect()
}

/// Rejects multi-line bodies and any line mentioning `poison`.
struct PickyEndpoint;

impl Respond for PickyEndpoint {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body = String::from_utf8_lossy(&request.body);
        if body.contains('\n') {
            ResponseTemplate::new(400).set_body_string("partial write: points beyond retention")
        } else if body.contains("poison") {
            ResponseTemplate::new(400).set_body_string("unable to parse")
        } else {
            ResponseTemplate::new(204)
        }
    }
}

#[tokio::test]
async fn shutdown_delivers_everything_in_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/write"))
        .and(query_param("db", "app"))
        .and(query_param("precision", "ms"))
        .respond_with(ResponseTemplate::new(204))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.set_max_batch_size(5).unwrap();
    config.set_base_tag("environment", "test");
    let pipeline = bootstrap::install(config).unwrap();

    for seq in 0..12 {
        assert_eq!(pipeline.add_measurement(point(seq)), Ok(true));
    }
    let report = pipeline.shutdown().await.unwrap();

    assert_eq!(report.delivered, 12);
    assert_eq!(report.failed, 0);
    let bodies = bodies(&server).await;
    assert_eq!(seqs(&bodies), (0..12).collect::<Vec<_>>());
    assert!(bodies
        .iter()
        .flat_map(|body| body.lines())
        .all(|line| line.starts_with("jobs,environment=test,queue=default ")));
}

#[tokio::test]
async fn rejected_batch_is_retried_line_by_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(PickyEndpoint).mount(&server).await;

    let pipeline = bootstrap::install(config_for(&server)).unwrap();
    for seq in 0..4 {
        let mut measurement = point(seq);
        if seq == 2 {
            measurement.set_tag("state", "poison");
        }
        pipeline.add_measurement(measurement).unwrap();
    }
    let report = pipeline.flush().await.unwrap();

    assert_eq!(report.delivered, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(bodies(&server).await.len(), 5);

    let metrics = pipeline.metrics();
    assert_eq!(metrics.item_retries, 4);
    assert_eq!(metrics.item_failures, 1);
    pipeline.shutdown().await.unwrap();
}

#[tokio::test]
async fn credentials_are_sent_as_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(basic_auth("writer", "s3cret"))
        .and(body_string_contains("seq=7i"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.set_credentials(Some("writer".into()), Some("s3cret".into()));
    let pipeline = bootstrap::install(config).unwrap();

    pipeline.add_measurement(point(7)).unwrap();
    let report = pipeline.shutdown().await.unwrap();
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn unreachable_endpoint_drops_the_batch() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut config = PipelineConfig::default();
    config.set_scheme("http").unwrap();
    config.set_host("127.0.0.1").unwrap();
    config.set_port(port).unwrap();
    config.set_tag_hostname(false);
    config.set_timeout_ms(500).unwrap();
    let pipeline = bootstrap::install(config).unwrap();

    for seq in 0..3 {
        pipeline.add_measurement(point(seq)).unwrap();
    }
    let report = pipeline.shutdown().await.unwrap();

    assert_eq!(report.delivered, 0);
    assert_eq!(report.failed, 3);
    assert_eq!(pipeline.buffered(), 0);
    let metrics = pipeline.metrics();
    assert_eq!(metrics.transport_failures, 1);
    assert_eq!(metrics.measurements_dropped, 3);
}
