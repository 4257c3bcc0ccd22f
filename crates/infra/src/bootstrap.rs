//! Pipeline bootstrap
//!
//! Wires configuration, the HTTP writer and host identity into a running
//! [`MetricsPipeline`]. Must be called from within a tokio runtime.

use std::sync::Arc;

use metricbuf_core::MetricsPipeline;
use metricbuf_domain::constants::HOSTNAME_TAG;
use metricbuf_domain::{PipelineConfig, Result};
use tracing::{info, warn};

use crate::config;
use crate::host;
use crate::http::InfluxWriter;

/// Load configuration (file plus `INFLUXDB_*` environment) and install a
/// pipeline writing over HTTP.
///
/// # Errors
/// Returns `MetricbufError::Config` for invalid configuration and
/// `MetricbufError::InvalidState` when no runtime is available.
pub fn install_from_env() -> Result<MetricsPipeline> {
    install(config::load()?)
}

/// Install a pipeline writing over HTTP with an explicit configuration.
pub fn install(mut config: PipelineConfig) -> Result<MetricsPipeline> {
    resolve_hostname_tag(&mut config);

    let writer = InfluxWriter::from_config(&config)?;
    let pipeline = MetricsPipeline::new(Arc::new(writer));
    pipeline.install(config)?;
    Ok(pipeline)
}

/// Add the `hostname` base tag when enabled and not already configured.
pub fn resolve_hostname_tag(config: &mut PipelineConfig) {
    if !config.tag_hostname || config.base_tags.contains_key(HOSTNAME_TAG) {
        return;
    }
    match host::hostname() {
        Some(name) => {
            info!(hostname = %name, "Tagging measurements with hostname");
            config.set_base_tag(HOSTNAME_TAG, name);
        }
        None => warn!("Hostname unavailable, measurements will not carry a hostname tag"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_tag_is_skipped_when_disabled() {
        let mut config = PipelineConfig::default();
        config.set_tag_hostname(false);
        resolve_hostname_tag(&mut config);
        assert!(!config.base_tags.contains_key(HOSTNAME_TAG));
    }

    #[test]
    fn configured_hostname_tag_is_kept() {
        let mut config = PipelineConfig::default();
        config.set_base_tag(HOSTNAME_TAG, "pinned");
        resolve_hostname_tag(&mut config);
        assert_eq!(config.base_tags.get(HOSTNAME_TAG).map(String::as_str), Some("pinned"));
    }

    #[test]
    fn install_outside_a_runtime_fails() {
        let mut config = PipelineConfig::default();
        config.set_tag_hostname(false);
        assert!(install(config).is_err());
    }

    #[tokio::test]
    async fn install_yields_a_running_pipeline() {
        let mut config = PipelineConfig::default();
        config.set_scheme("http").unwrap();
        let pipeline = install(config).unwrap();
        assert_eq!(pipeline.lifecycle(), metricbuf_domain::Lifecycle::Running);
        assert_eq!(pipeline.shutdown().await.unwrap().delivered, 0);
        assert_eq!(pipeline.lifecycle(), metricbuf_domain::Lifecycle::Stopped);
    }
}
