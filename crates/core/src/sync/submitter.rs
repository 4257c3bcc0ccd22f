//! Batch submission with per-item fallback
//!
//! One write request per batch. If the endpoint answers with anything other
//! than 2xx, each encoded line is written on its own so a single bad point
//! cannot poison the rest of the batch. Transport failures drop the batch;
//! nothing is ever handed back to the buffer.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::batch::Batch;
use crate::encoder::encode;
use crate::metrics::PipelineMetrics;
use crate::sync::ports::{LineWriter, TransportError};

/// What happened to one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The batch write was accepted
    Sent { count: usize },
    /// The batch was rejected and every line was retried on its own
    Retried { sent: usize, failed: usize },
    /// No usable response; the lines were dropped
    Failed { dropped: usize },
    /// Nothing in the batch could be encoded; no request was issued
    Empty,
}

impl SubmitOutcome {
    /// Measurements the endpoint accepted
    pub fn delivered(&self) -> usize {
        match self {
            Self::Sent { count } => *count,
            Self::Retried { sent, .. } => *sent,
            Self::Failed { .. } | Self::Empty => 0,
        }
    }
}

/// Encodes batches and writes them through a [`LineWriter`]
pub struct Submitter {
    writer: Arc<dyn LineWriter>,
    metrics: Arc<PipelineMetrics>,
}

impl Submitter {
    pub fn new(writer: Arc<dyn LineWriter>, metrics: Arc<PipelineMetrics>) -> Self {
        Self { writer, metrics }
    }

    #[instrument(skip(self, batch), fields(batch_id = %batch.id(), database = %batch.database(), count = batch.len()))]
    pub async fn submit(&self, batch: Batch) -> SubmitOutcome {
        let lines = self.encode_lines(&batch);
        if lines.is_empty() {
            debug!("No encodable measurements in batch");
            return SubmitOutcome::Empty;
        }

        let database = batch.database();
        let count = lines.len();
        match self.writer.write(database, lines.join("\n")).await {
            Ok(response) if response.is_success() => {
                debug!(status = response.status, count, "Batch written");
                self.metrics.record_batch_sent(count);
                SubmitOutcome::Sent { count }
            }
            Ok(response) => {
                warn!(
                    status = response.status,
                    body = %response.body,
                    count,
                    "Batch rejected, retrying measurements individually"
                );
                self.submit_individually(database, lines).await
            }
            Err(err) => {
                self.log_transport_failure(&err, count);
                self.metrics.record_transport_failure(count);
                SubmitOutcome::Failed { dropped: count }
            }
        }
    }

    fn encode_lines(&self, batch: &Batch) -> Vec<String> {
        let mut failures = 0;
        let lines: Vec<String> = batch
            .measurements()
            .iter()
            .filter_map(|measurement| match encode(measurement) {
                Ok(line) => Some(line),
                Err(err) => {
                    failures += 1;
                    warn!(error = %err, "Skipping measurement that cannot be encoded");
                    None
                }
            })
            .collect();
        if failures > 0 {
            self.metrics.record_encode_failures(failures);
        }
        lines
    }

    async fn submit_individually(&self, database: &str, lines: Vec<String>) -> SubmitOutcome {
        let mut sent = 0;
        let mut failed = 0;
        for line in lines {
            match self.writer.write(database, line).await {
                Ok(response) if response.is_success() => sent += 1,
                Ok(response) => {
                    failed += 1;
                    warn!(status = response.status, body = %response.body, "Measurement rejected");
                }
                Err(err) => {
                    failed += 1;
                    warn!(error = %err, "Measurement write failed");
                }
            }
        }
        self.metrics.record_item_pass(sent, failed);
        SubmitOutcome::Retried { sent, failed }
    }

    fn log_transport_failure(&self, err: &TransportError, dropped: usize) {
        match err {
            TransportError::Timeout(_) => warn!(error = %err, dropped, "Batch write timed out"),
            _ => warn!(error = %err, dropped, "Batch write failed"),
        }
    }
}

impl std::fmt::Debug for Submitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Submitter").finish_non_exhaustive()
    }
}
