//! Pipeline counters
//!
//! Every dropped, failed or sent measurement is counted here so that the
//! fire-and-forget `add_measurement` contract still leaves a trail.
//!
//! ## Design
//! - **Relaxed ordering**: counters are independent, no derived values
//! - **No locking**: updated from the add path and from flush tasks

use std::sync::atomic::{AtomicU64, Ordering};

use metricbuf_domain::AdmissionError;
use serde::Serialize;

/// Atomic counters shared by one pipeline instance
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    accepted: AtomicU64,
    discarded_disabled: AtomicU64,
    discarded_stopping: AtomicU64,
    discarded_buffer_full: AtomicU64,
    discarded_empty_database: AtomicU64,
    encode_failures: AtomicU64,
    batches_sent: AtomicU64,
    batches_sampled_out: AtomicU64,
    measurements_sent: AtomicU64,
    measurements_sampled_out: AtomicU64,
    item_retries: AtomicU64,
    item_failures: AtomicU64,
    transport_failures: AtomicU64,
    measurements_dropped: AtomicU64,
    flush_cycles: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, reason: AdmissionError) {
        let counter = match reason {
            AdmissionError::Disabled => &self.discarded_disabled,
            AdmissionError::Stopping => &self.discarded_stopping,
            AdmissionError::BufferFull { .. } => &self.discarded_buffer_full,
            AdmissionError::EmptyDatabase => &self.discarded_empty_database,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_encode_failures(&self, count: usize) {
        self.encode_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// A batch write accepted `count` measurements in one request.
    pub fn record_batch_sent(&self, count: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.measurements_sent.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_sampled_out(&self, count: usize) {
        self.batches_sampled_out.fetch_add(1, Ordering::Relaxed);
        self.measurements_sampled_out.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Outcome of a per-item fallback pass.
    pub fn record_item_pass(&self, sent: usize, failed: usize) {
        self.item_retries.fetch_add((sent + failed) as u64, Ordering::Relaxed);
        self.measurements_sent.fetch_add(sent as u64, Ordering::Relaxed);
        self.item_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self, dropped: usize) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
        self.measurements_dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn record_flush_cycle(&self) {
        self.flush_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            accepted: load(&self.accepted),
            discarded: DiscardCounts {
                disabled: load(&self.discarded_disabled),
                stopping: load(&self.discarded_stopping),
                buffer_full: load(&self.discarded_buffer_full),
                empty_database: load(&self.discarded_empty_database),
            },
            encode_failures: load(&self.encode_failures),
            batches_sent: load(&self.batches_sent),
            batches_sampled_out: load(&self.batches_sampled_out),
            measurements_sent: load(&self.measurements_sent),
            measurements_sampled_out: load(&self.measurements_sampled_out),
            item_retries: load(&self.item_retries),
            item_failures: load(&self.item_failures),
            transport_failures: load(&self.transport_failures),
            measurements_dropped: load(&self.measurements_dropped),
            flush_cycles: load(&self.flush_cycles),
        }
    }
}

/// Discards by admission reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscardCounts {
    pub disabled: u64,
    pub stopping: u64,
    pub buffer_full: u64,
    pub empty_database: u64,
}

impl DiscardCounts {
    pub fn total(&self) -> u64 {
        self.disabled + self.stopping + self.buffer_full + self.empty_database
    }
}

/// Serializable view of [`PipelineMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub accepted: u64,
    pub discarded: DiscardCounts,
    pub encode_failures: u64,
    pub batches_sent: u64,
    pub batches_sampled_out: u64,
    pub measurements_sent: u64,
    pub measurements_sampled_out: u64,
    /// Individual writes issued by the per-item fallback
    pub item_retries: u64,
    pub item_failures: u64,
    pub transport_failures: u64,
    pub measurements_dropped: u64,
    pub flush_cycles: u64,
}
