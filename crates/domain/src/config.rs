//! Pipeline configuration
//!
//! A single record that is mutated through validating setters before the
//! pipeline is installed and treated as read-only afterwards.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BUFFER_WARN_INTERVAL_MS, DEFAULT_BUFFER_WARN_THRESHOLD, DEFAULT_HOST,
    DEFAULT_INTERVAL_MS, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_BUFFER_SIZE,
    DEFAULT_MAX_CONCURRENT_WRITES, DEFAULT_PORT, DEFAULT_SAMPLE_PROBABILITY, DEFAULT_SCHEME,
    DEFAULT_TIMEOUT_MS, DEFAULT_TRIGGER_SIZE, WRITE_PATH,
};
use crate::errors::ConfigError;

/// Configuration for the buffering and submission pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Request scheme for the write endpoint (`http` or `https`)
    pub scheme: String,
    /// Write endpoint host
    pub host: String,
    /// Write endpoint port
    pub port: u16,
    /// Endpoint user (basic auth is sent only when both user and password are set)
    pub user: Option<String>,
    /// Endpoint password
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Master switch; when off every measurement is discarded
    pub enabled: bool,
    /// Interval timer period in milliseconds
    pub interval_ms: u64,
    /// Cap on measurements per write request
    pub max_batch_size: usize,
    /// Cap on buffered measurements before new ones are discarded
    pub max_buffer_size: usize,
    /// Buffer size that forces an immediate flush
    pub trigger_size: usize,
    /// Probability in [0, 1] that a batch is actually sent
    pub sample_probability: f64,
    /// Add the local hostname as a base tag
    pub tag_hostname: bool,
    /// Tags added to every measurement that does not already carry them
    pub base_tags: BTreeMap<String, String>,
    /// HTTP request timeout for writes, in milliseconds
    pub timeout_ms: u64,
    /// Databases submitted concurrently during one flush cycle
    pub max_concurrent_writes: usize,
    /// Buffer size above which growth warnings are logged
    pub buffer_warn_threshold: usize,
    /// Minimum spacing between buffer growth warnings, in milliseconds
    pub buffer_warn_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            enabled: true,
            interval_ms: DEFAULT_INTERVAL_MS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            trigger_size: DEFAULT_TRIGGER_SIZE,
            sample_probability: DEFAULT_SAMPLE_PROBABILITY,
            tag_hostname: true,
            base_tags: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
            buffer_warn_threshold: DEFAULT_BUFFER_WARN_THRESHOLD,
            buffer_warn_interval_ms: DEFAULT_BUFFER_WARN_INTERVAL_MS,
        }
    }
}

impl PipelineConfig {
    pub fn set_scheme(&mut self, scheme: &str) -> Result<(), ConfigError> {
        let scheme = scheme.to_ascii_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::UnsupportedScheme(scheme));
        }
        self.scheme = scheme;
        Ok(())
    }

    pub fn set_host(&mut self, host: &str) -> Result<(), ConfigError> {
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        self.host = host.trim().to_string();
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        self.port = non_zero("port", port)?;
        Ok(())
    }

    /// Set or clear the endpoint credentials.
    pub fn set_credentials(&mut self, user: Option<String>, password: Option<String>) {
        self.user = user.filter(|u| !u.is_empty());
        self.password = password.filter(|p| !p.is_empty());
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<(), ConfigError> {
        self.interval_ms = non_zero("interval", interval_ms)?;
        Ok(())
    }

    pub fn set_max_batch_size(&mut self, limit: usize) -> Result<(), ConfigError> {
        self.max_batch_size = non_zero("max_batch_size", limit)?;
        Ok(())
    }

    pub fn set_max_buffer_size(&mut self, limit: usize) -> Result<(), ConfigError> {
        self.max_buffer_size = non_zero("max_buffer_size", limit)?;
        Ok(())
    }

    pub fn set_trigger_size(&mut self, size: usize) -> Result<(), ConfigError> {
        self.trigger_size = non_zero("trigger_size", size)?;
        Ok(())
    }

    pub fn set_sample_probability(&mut self, probability: f64) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(ConfigError::SampleProbabilityOutOfRange(probability));
        }
        self.sample_probability = probability;
        Ok(())
    }

    pub fn set_tag_hostname(&mut self, enabled: bool) {
        self.tag_hostname = enabled;
    }

    pub fn set_base_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.base_tags.insert(key.into(), value.into());
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), ConfigError> {
        self.timeout_ms = non_zero("timeout", timeout_ms)?;
        Ok(())
    }

    pub fn set_max_concurrent_writes(&mut self, limit: usize) -> Result<(), ConfigError> {
        self.max_concurrent_writes = non_zero("max_concurrent_writes", limit)?;
        Ok(())
    }

    pub fn set_buffer_warn_threshold(&mut self, threshold: usize) {
        self.buffer_warn_threshold = threshold;
    }

    /// Zero logs every growth warning.
    pub fn set_buffer_warn_interval_ms(&mut self, interval_ms: u64) {
        self.buffer_warn_interval_ms = interval_ms;
    }

    /// Check every tunable. Used for configs that bypassed the setters
    /// (deserialized files, struct literals).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut probe = Self::default();
        probe.set_scheme(&self.scheme)?;
        probe.set_host(&self.host)?;
        probe.set_port(self.port)?;
        probe.set_interval_ms(self.interval_ms)?;
        probe.set_max_batch_size(self.max_batch_size)?;
        probe.set_max_buffer_size(self.max_buffer_size)?;
        probe.set_trigger_size(self.trigger_size)?;
        probe.set_sample_probability(self.sample_probability)?;
        probe.set_timeout_ms(self.timeout_ms)?;
        probe.set_max_concurrent_writes(self.max_concurrent_writes)?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn buffer_warn_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_warn_interval_ms)
    }

    /// Base URL of the write endpoint, without query parameters.
    pub fn write_url(&self) -> String {
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, WRITE_PATH)
    }

    /// Credentials, only when both halves are present.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.user.as_deref(), self.password.as_deref()) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }
}

fn non_zero<T: Default + PartialEq>(name: &'static str, value: T) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Zero { name });
    }
    Ok(value)
}
