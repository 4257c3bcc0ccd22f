//! # metricbuf Core
//!
//! Buffering, scheduling, batching and submission logic - no HTTP code.
//!
//! This crate contains:
//! - The line protocol encoder
//! - The measurement buffer and flush scheduler state machine
//! - Batch construction with whole-batch sampling
//! - The submitter with per-item fallback
//! - The [`MetricsPipeline`] context object tying them together
//! - Port interfaces (traits) for the write endpoint and request
//!   instrumentation
//!
//! ## Architecture Principles
//! - Only depends on `metricbuf-domain`
//! - All I/O goes through [`LineWriter`]
//! - State transitions are pure and unit-tested without a runtime

pub mod batch;
pub mod buffer;
pub mod encoder;
pub mod errors;
pub mod instrumentation;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod sync;

// Re-export specific items to avoid ambiguity
pub use batch::{Batch, Batcher, FixedSampler, SampledBatch, Sampler, ThreadRngSampler};
pub use buffer::MeasurementBuffer;
pub use encoder::encode;
pub use errors::{PipelineError, PipelineResult};
pub use instrumentation::{
    DefaultRequestInstrumentation, RequestInfo, RequestInstrumentation, ResponseInfo,
};
pub use metrics::{DiscardCounts, MetricsSnapshot, PipelineMetrics};
pub use pipeline::{FlushReport, MetricsPipeline};
pub use scheduler::{FlushScheduler, ForcedFlush, SchedulerAction};
pub use sync::ports::{LineWriter, TransportError, WriteResponse};
pub use sync::{SubmitOutcome, Submitter};
