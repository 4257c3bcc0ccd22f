//! Pipeline constants
//!
//! Centralized defaults for configuration and the write endpoint.

// Endpoint defaults
pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8086;
pub const WRITE_PATH: &str = "/write";
pub const WRITE_PRECISION: &str = "ms";

// Flush scheduling defaults
pub const DEFAULT_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 5_000;
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 20_000;
pub const DEFAULT_TRIGGER_SIZE: usize = 5_000;
pub const DEFAULT_SAMPLE_PROBABILITY: f64 = 1.0;

// Submission defaults
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_MAX_CONCURRENT_WRITES: usize = 10;

// Buffer growth warnings
pub const DEFAULT_BUFFER_WARN_THRESHOLD: usize = 5_000;
pub const DEFAULT_BUFFER_WARN_INTERVAL_MS: u64 = 120_000;

// Base tag names
pub const HOSTNAME_TAG: &str = "hostname";
pub const ENVIRONMENT_TAG: &str = "environment";

pub const USER_AGENT: &str = concat!("metricbuf/v", env!("CARGO_PKG_VERSION"));
