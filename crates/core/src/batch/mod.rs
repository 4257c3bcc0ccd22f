//! Batch construction and sampling
//!
//! This module slices one database's drained measurements into size-capped
//! batches and applies the whole-batch sampling policy.

pub mod batcher;
pub mod sampler;

use metricbuf_domain::Measurement;
use uuid::Uuid;

pub use batcher::{Batcher, SampledBatch};
pub use sampler::{FixedSampler, Sampler, ThreadRngSampler};

/// At most `max_batch_size` measurements bound for one database
///
/// Owned by the submitter for exactly one write attempt; never re-queued.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    id: String,
    database: String,
    measurements: Vec<Measurement>,
}

impl Batch {
    pub fn new(database: impl Into<String>, measurements: Vec<Measurement>) -> Self {
        Self { id: Uuid::new_v4().to_string(), database: database.into(), measurements }
    }

    /// Correlation id for logs
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn into_measurements(self) -> Vec<Measurement> {
        self.measurements
    }
}
