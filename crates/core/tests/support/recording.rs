//! In-memory [`LineWriter`] that records every request.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metricbuf_core::{LineWriter, TransportError, WriteResponse};
use parking_lot::Mutex;

/// How the writer answers
#[derive(Debug, Clone)]
pub enum WriterMode {
    /// 204 for everything
    AcceptAll,
    /// 400 for multi-line bodies, 204 for single lines
    RejectBatches,
    /// 400 for any body containing the needle
    RejectContaining(String),
    /// Every write fails before a response
    TransportFailure,
}

/// One recorded write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    pub database: String,
    pub body: String,
}

impl RecordedWrite {
    pub fn lines(&self) -> Vec<&str> {
        self.body.lines().collect()
    }

    /// `seq` field of every line, in body order.
    pub fn seqs(&self) -> Vec<i64> {
        self.body
            .lines()
            .filter_map(|line| {
                let fields = line.split(' ').nth(1)?;
                let seq = fields.split(',').find_map(|f| f.strip_prefix("seq="))?;
                seq.trim_end_matches('i').parse().ok()
            })
            .collect()
    }
}

pub struct RecordingWriter {
    mode: WriterMode,
    delay: Option<Duration>,
    writes: Mutex<Vec<RecordedWrite>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingWriter {
    pub fn new(mode: WriterMode) -> Arc<Self> {
        Self::build(mode, None)
    }

    /// Every write sleeps for `delay` before answering.
    pub fn slow(mode: WriterMode, delay: Duration) -> Arc<Self> {
        Self::build(mode, Some(delay))
    }

    fn build(mode: WriterMode, delay: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            mode,
            delay,
            writes: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }

    /// Every `seq` seen across all requests
    pub fn all_seqs(&self) -> Vec<i64> {
        self.writes().iter().flat_map(RecordedWrite::seqs).collect()
    }

    /// Highest number of writes that were awaiting a response at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LineWriter for RecordingWriter {
    async fn write(&self, database: &str, body: String) -> Result<WriteResponse, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.writes.lock().push(RecordedWrite { database: database.to_string(), body: body.clone() });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.mode {
            WriterMode::AcceptAll => Ok(WriteResponse::new(204, "")),
            WriterMode::RejectBatches if body.contains('\n') => {
                Ok(WriteResponse::new(400, "partial write: points beyond retention policy dropped"))
            }
            WriterMode::RejectBatches => Ok(WriteResponse::new(204, "")),
            WriterMode::RejectContaining(needle) if body.contains(needle.as_str()) => {
                Ok(WriteResponse::new(400, "unable to parse"))
            }
            WriterMode::RejectContaining(_) => Ok(WriteResponse::new(204, "")),
            WriterMode::TransportFailure => Err(TransportError::Connection("connection refused".into())),
        }
    }
}
