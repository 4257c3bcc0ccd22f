//! # metricbuf Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The HTTP line writer (`reqwest`)
//! - Configuration loading from files and `INFLUXDB_*` variables
//! - Logging setup (`tracing-subscriber`)
//! - Host identity (`sysinfo`)
//! - axum request metrics middleware
//!
//! ## Architecture
//! - Implements traits defined in `metricbuf-core`
//! - Contains all "impure" code (network, environment, filesystem)

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod host;
pub mod http;
pub mod integrations;
pub mod logging;

// Re-export commonly used items
pub use bootstrap::{install, install_from_env};
pub use errors::InfraError;
pub use http::{InfluxWriter, InfluxWriterBuilder};
pub use integrations::{record_request, RequestMetrics};
pub use logging::{init_logging, LogFormat};
