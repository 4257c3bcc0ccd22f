//! Configuration loader
//!
//! Loads [`PipelineConfig`] from an optional file and the environment.
//!
//! ## Loading Strategy
//! 1. Start from defaults, or from the first config file found by
//!    [`probe_config_paths`]
//! 2. Overlay every `INFLUXDB_*` variable that is set
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `INFLUXDB_ENABLED`: master switch (true/false)
//! - `INFLUXDB_SCHEME`, `INFLUXDB_HOST`, `INFLUXDB_PORT`: write endpoint
//! - `INFLUXDB_USER`, `INFLUXDB_PASSWORD`: basic auth credentials
//! - `INFLUXDB_INTERVAL`: flush interval in milliseconds
//! - `INFLUXDB_MAX_BATCH_SIZE`, `INFLUXDB_MAX_BUFFER_SIZE`,
//!   `INFLUXDB_TRIGGER_SIZE`: size limits
//! - `INFLUXDB_SAMPLE_PROBABILITY`: batch sampling probability in [0, 1]
//! - `INFLUXDB_TAG_HOSTNAME`: tag measurements with the local hostname
//! - `INFLUXDB_TIMEOUT`: write request timeout in milliseconds
//! - `ENVIRONMENT`: added as the `environment` base tag
//!
//! ## File Locations
//! The loader probes `metricbuf.json` and `metricbuf.toml` in the current
//! working directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use metricbuf_domain::constants::ENVIRONMENT_TAG;
use metricbuf_domain::{ConfigError, MetricbufError, PipelineConfig, Result};

use crate::errors::InfraError;

/// Load configuration: file (if any) overlaid with the environment.
///
/// # Errors
/// Returns `MetricbufError::Config` if a file is found but cannot be parsed,
/// or if any variable or resulting value is invalid.
pub fn load() -> Result<PipelineConfig> {
    let mut config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            PipelineConfig::default()
        }
    };
    apply_env(&mut config)?;
    Ok(config)
}

/// Defaults overlaid with the environment.
pub fn load_from_env() -> Result<PipelineConfig> {
    let mut config = PipelineConfig::default();
    apply_env(&mut config)?;
    Ok(config)
}

/// Overlay every recognized environment variable onto `config`.
///
/// Each value goes through the matching validating setter.
pub fn apply_env(config: &mut PipelineConfig) -> Result<()> {
    if let Some(enabled) = env_bool("INFLUXDB_ENABLED") {
        config.set_enabled(enabled);
    }
    if let Some(scheme) = env_string("INFLUXDB_SCHEME") {
        config.set_scheme(&scheme)?;
    }
    if let Some(host) = env_string("INFLUXDB_HOST") {
        config.set_host(&host)?;
    }
    if let Some(port) = env_parse::<u16>("INFLUXDB_PORT")? {
        config.set_port(port)?;
    }

    let user = env_string("INFLUXDB_USER").or_else(|| config.user.clone());
    let password = env_string("INFLUXDB_PASSWORD").or_else(|| config.password.clone());
    config.set_credentials(user, password);

    if let Some(interval) = env_parse::<u64>("INFLUXDB_INTERVAL")? {
        config.set_interval_ms(interval)?;
    }
    if let Some(limit) = env_parse::<usize>("INFLUXDB_MAX_BATCH_SIZE")? {
        config.set_max_batch_size(limit)?;
    }
    if let Some(limit) = env_parse::<usize>("INFLUXDB_MAX_BUFFER_SIZE")? {
        config.set_max_buffer_size(limit)?;
    }
    if let Some(size) = env_parse::<usize>("INFLUXDB_TRIGGER_SIZE")? {
        config.set_trigger_size(size)?;
    }
    if let Some(probability) = env_parse::<f64>("INFLUXDB_SAMPLE_PROBABILITY")? {
        config.set_sample_probability(probability)?;
    }
    if let Some(tag_hostname) = env_bool("INFLUXDB_TAG_HOSTNAME") {
        config.set_tag_hostname(tag_hostname);
    }
    if let Some(timeout) = env_parse::<u64>("INFLUXDB_TIMEOUT")? {
        config.set_timeout_ms(timeout)?;
    }
    if let Some(environment) = env_string("ENVIRONMENT") {
        config.set_base_tag(ENVIRONMENT_TAG, environment);
    }

    config.validate()?;
    Ok(())
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is chosen by
/// extension (`.json` or `.toml`); missing keys take their defaults.
///
/// # Errors
/// Returns `MetricbufError::Config` if the file is missing, unreadable,
/// malformed, or holds invalid values.
pub fn load_from_file(path: Option<PathBuf>) -> Result<PipelineConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(MetricbufError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            MetricbufError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;
    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<PipelineConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => Ok(serde_json::from_str(contents).map_err(InfraError::from)?),
        _ => Err(MetricbufError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(PathBuf::from))
    {
        dirs.push(exe_dir);
    }

    dirs.into_iter()
        .flat_map(|dir| [dir.join("metricbuf.json"), dir.join("metricbuf.toml")])
        .find(|path| path.exists())
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a typed value from an environment variable, if set.
///
/// # Errors
/// Returns `MetricbufError::Config` naming the variable if parsing fails.
fn env_parse<T>(key: &'static str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| {
                MetricbufError::from(ConfigError::Invalid {
                    name: key,
                    reason: format!("'{raw}': {e}"),
                })
            })
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
