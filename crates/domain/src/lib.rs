//! # metricbuf Domain
//!
//! Domain types shared by the pipeline crates.
//!
//! This crate contains:
//! - `Measurement` and typed field values
//! - Pipeline configuration with validating setters
//! - Domain error types and Result definitions
//! - Scheduler/lifecycle states and constants
//!
//! ## Architecture
//! - No dependencies on other metricbuf crates
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
