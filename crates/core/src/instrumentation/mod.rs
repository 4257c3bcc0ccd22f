//! Per-request instrumentation
//!
//! A host request layer calls [`RequestInstrumentation::start`] when a
//! request arrives and [`RequestInstrumentation::finish`] when the response
//! is ready, then submits the measurement through the pipeline.

pub mod ports;
pub mod service;

pub use ports::{RequestInfo, RequestInstrumentation, ResponseInfo};
pub use service::{DefaultRequestInstrumentation, DEFAULT_REQUEST_MEASUREMENT};
