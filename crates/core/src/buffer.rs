//! In-memory measurement buffer
//!
//! Pending measurements grouped by destination database. Admission is a hard
//! cutoff: once `max_size` measurements are queued, new ones are rejected
//! and nothing already queued is evicted.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use metricbuf_domain::{AdmissionError, Measurement};
use tracing::warn;

/// Per-database FIFO queues under one global size cap
#[derive(Debug)]
pub struct MeasurementBuffer {
    queues: HashMap<String, VecDeque<Measurement>>,
    len: usize,
    max_size: usize,
    enabled: bool,
    warn_threshold: usize,
    warn_interval: Duration,
    last_warned: Option<Instant>,
}

impl MeasurementBuffer {
    pub fn new(max_size: usize, enabled: bool) -> Self {
        Self {
            queues: HashMap::new(),
            len: 0,
            max_size,
            enabled,
            warn_threshold: usize::MAX,
            warn_interval: Duration::ZERO,
            last_warned: None,
        }
    }

    /// Log a growth warning when the buffer grows past `threshold`, at most
    /// once per `interval`. A zero threshold disables the warning.
    pub fn with_growth_warning(mut self, threshold: usize, interval: Duration) -> Self {
        self.warn_threshold = if threshold == 0 { usize::MAX } else { threshold };
        self.warn_interval = interval;
        self
    }

    /// Queue a measurement, stamping it with the current time if it carries
    /// no timestamp. Returns the new buffer size.
    pub fn add(&mut self, mut measurement: Measurement) -> Result<usize, AdmissionError> {
        if !self.enabled {
            return Err(AdmissionError::Disabled);
        }
        if measurement.database().is_empty() {
            return Err(AdmissionError::EmptyDatabase);
        }
        if self.len >= self.max_size {
            return Err(AdmissionError::BufferFull { limit: self.max_size });
        }

        measurement.stamp_if_unset(Utc::now());
        self.queues.entry(measurement.database().to_string()).or_default().push_back(measurement);
        self.len += 1;
        self.maybe_warn();
        Ok(self.len)
    }

    /// Remove up to `limit` measurements for `database`, oldest first.
    pub fn drain(&mut self, database: &str, limit: usize) -> Vec<Measurement> {
        let Some(queue) = self.queues.get_mut(database) else {
            return Vec::new();
        };
        let take = limit.min(queue.len());
        let drained: Vec<Measurement> = queue.drain(..take).collect();
        if queue.is_empty() {
            self.queues.remove(database);
        }
        self.len -= drained.len();
        drained
    }

    pub fn size(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn databases_present(&self) -> BTreeSet<String> {
        self.queues.keys().cloned().collect()
    }

    fn maybe_warn(&mut self) {
        if self.len <= self.warn_threshold {
            return;
        }
        let now = Instant::now();
        let due = self.last_warned.map_or(true, |at| now.duration_since(at) >= self.warn_interval);
        if due {
            self.last_warned = Some(now);
            warn!(size = self.len, threshold = self.warn_threshold, "Measurement buffer is growing");
        }
    }
}
