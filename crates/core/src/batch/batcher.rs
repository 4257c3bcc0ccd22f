//! Batcher: size-capped slicing plus whole-batch sampling

use std::sync::Arc;

use metricbuf_domain::Measurement;

use super::sampler::Sampler;
use super::Batch;

/// A batch together with its sampling decision
#[derive(Debug, Clone, PartialEq)]
pub enum SampledBatch {
    /// Hand to the submitter
    Keep(Batch),
    /// Discarded by sampling; not sent, not re-queued
    Drop(Batch),
}

/// Splits drained measurements into batches of at most `max_batch_size`
pub struct Batcher {
    max_batch_size: usize,
    sample_probability: f64,
    sampler: Arc<dyn Sampler>,
}

impl Batcher {
    pub fn new(max_batch_size: usize, sample_probability: f64, sampler: Arc<dyn Sampler>) -> Self {
        Self { max_batch_size: max_batch_size.max(1), sample_probability, sampler }
    }

    /// FIFO order is preserved within and across batch boundaries.
    pub fn split(&self, database: &str, measurements: Vec<Measurement>) -> Vec<SampledBatch> {
        let mut batches = Vec::with_capacity(measurements.len().div_ceil(self.max_batch_size));
        let mut remaining = measurements.into_iter();
        loop {
            let chunk: Vec<Measurement> = remaining.by_ref().take(self.max_batch_size).collect();
            if chunk.is_empty() {
                break;
            }
            let batch = Batch::new(database, chunk);
            batches.push(if self.keep() { SampledBatch::Keep(batch) } else { SampledBatch::Drop(batch) });
        }
        batches
    }

    /// One draw per batch: a draw at or above the probability drops it, so
    /// 0.0 never sends and 1.0 always does.
    fn keep(&self) -> bool {
        self.sampler.draw() < self.sample_probability
    }
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("max_batch_size", &self.max_batch_size)
            .field("sample_probability", &self.sample_probability)
            .finish_non_exhaustive()
    }
}
