//! Shared test helpers for `metricbuf-core` integration tests.
//!
//! A recording [`LineWriter`] plus small builders so the property tests can
//! focus on behaviour instead of boilerplate.

#![allow(dead_code)]

pub mod recording;

use metricbuf_domain::{Measurement, PipelineConfig};

pub use recording::{RecordedWrite, RecordingWriter, WriterMode};

/// Config with timers far enough out that only the test decides when to flush.
pub fn quiet_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.set_tag_hostname(false);
    config.set_interval_ms(60_000).unwrap();
    config.set_trigger_size(10_000).unwrap();
    config
}

/// Measurement carrying its sequence number as the `seq` field.
pub fn point(database: &str, seq: i64) -> Measurement {
    Measurement::new(database, "test").with_tag("source", "it").with_field("seq", seq)
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
