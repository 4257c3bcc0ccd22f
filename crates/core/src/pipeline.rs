//! Buffering and flush pipeline
//!
//! [`MetricsPipeline`] is the context object that owns the buffer, the
//! scheduler and the interval timer. Cloning it yields another handle to the
//! same pipeline, so it can be shared with request middleware.
//!
//! # Concurrency
//! - All state sits behind one `parking_lot` mutex that is never held across
//!   an `.await`; the only suspension points are the writes themselves.
//! - The `Flushing` scheduler state is the sole guard against overlapping
//!   cycles. `add_measurement` stays O(1) while a cycle is in flight.
//! - A cycle drains everything buffered at the moment it starts. Databases
//!   are submitted concurrently; batches within one database go in order.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use metricbuf_core::{LineWriter, MetricsPipeline};
//! use metricbuf_domain::{Measurement, PipelineConfig};
//!
//! # async fn example(writer: Arc<dyn LineWriter>) -> Result<(), metricbuf_core::PipelineError> {
//! let pipeline = MetricsPipeline::new(writer);
//! pipeline.install(PipelineConfig::default())?;
//!
//! let mut measurement = Measurement::new("example", "requests");
//! measurement.set_tag("method", "GET").set_field("duration", 0.012);
//! pipeline.add_measurement(measurement)?;
//!
//! pipeline.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metricbuf_domain::{AdmissionError, Lifecycle, Measurement, PipelineConfig, SchedulerState};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use crate::batch::{Batcher, SampledBatch, Sampler, ThreadRngSampler};
use crate::buffer::MeasurementBuffer;
use crate::errors::{PipelineError, PipelineResult};
use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::scheduler::{FlushScheduler, ForcedFlush, SchedulerAction};
use crate::sync::{LineWriter, SubmitOutcome, Submitter};

/// Aggregate result of one or more flush cycles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Flush cycles covered by this report
    pub cycles: usize,
    /// Measurements taken out of the buffer
    pub drained: usize,
    /// Batches handed to the submitter
    pub batches_submitted: usize,
    /// Batches discarded by sampling
    pub batches_sampled_out: usize,
    /// Measurements the endpoint accepted
    pub delivered: usize,
    /// Measurements rejected individually or lost to transport failures
    pub failed: usize,
}

impl FlushReport {
    pub fn merge(&mut self, other: FlushReport) {
        self.cycles += other.cycles;
        self.drained += other.drained;
        self.batches_submitted += other.batches_submitted;
        self.batches_sampled_out += other.batches_sampled_out;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }

    fn record(&mut self, outcome: SubmitOutcome) {
        self.batches_submitted += 1;
        self.delivered += outcome.delivered();
        match outcome {
            SubmitOutcome::Retried { failed, .. } => self.failed += failed,
            SubmitOutcome::Failed { dropped } => self.failed += dropped,
            SubmitOutcome::Sent { .. } | SubmitOutcome::Empty => {}
        }
    }
}

/// Handle to a buffering pipeline. Cheap to clone.
#[derive(Clone)]
pub struct MetricsPipeline {
    shared: Arc<Shared>,
}

struct Shared {
    writer: Arc<dyn LineWriter>,
    sampler: Arc<dyn Sampler>,
    metrics: Arc<PipelineMetrics>,
    state: Mutex<PipelineState>,
    cycle_done: Notify,
}

struct PipelineState {
    lifecycle: Lifecycle,
    run: Option<RunContext>,
}

/// Everything that exists only between `install` and the next `install`.
struct RunContext {
    config: Arc<PipelineConfig>,
    buffer: MeasurementBuffer,
    scheduler: FlushScheduler,
    timer: Option<(u64, CancellationToken)>,
    timer_seq: u64,
    batcher: Arc<Batcher>,
    submitter: Arc<Submitter>,
    runtime: Handle,
}

/// Work captured under the lock when a cycle starts
struct Cycle {
    drained: Vec<(String, Vec<Measurement>)>,
    batcher: Arc<Batcher>,
    submitter: Arc<Submitter>,
    concurrency: usize,
}

impl MetricsPipeline {
    pub fn new(writer: Arc<dyn LineWriter>) -> Self {
        Self::with_sampler(writer, Arc::new(ThreadRngSampler))
    }

    /// Use a custom random source for batch sampling.
    pub fn with_sampler(writer: Arc<dyn LineWriter>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                writer,
                sampler,
                metrics: Arc::new(PipelineMetrics::new()),
                state: Mutex::new(PipelineState { lifecycle: Lifecycle::NotInstalled, run: None }),
                cycle_done: Notify::new(),
            }),
        }
    }

    /// Initialize buffer, scheduler and timer state.
    ///
    /// Must be called from within a tokio runtime; timers and flush cycles
    /// are spawned onto it. Fails if the pipeline is already running.
    pub fn install(&self, config: PipelineConfig) -> PipelineResult<()> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let mut state = self.shared.state.lock();
        if matches!(state.lifecycle, Lifecycle::Running | Lifecycle::Stopping) {
            return Err(PipelineError::AlreadyInstalled);
        }

        let buffer = MeasurementBuffer::new(config.max_buffer_size, config.enabled)
            .with_growth_warning(config.buffer_warn_threshold, config.buffer_warn_interval());
        let batcher = Batcher::new(
            config.max_batch_size,
            config.sample_probability,
            Arc::clone(&self.shared.sampler),
        );
        let submitter =
            Submitter::new(Arc::clone(&self.shared.writer), Arc::clone(&self.shared.metrics));

        info!(
            url = %config.write_url(),
            enabled = config.enabled,
            interval_ms = config.interval_ms,
            trigger_size = config.trigger_size,
            max_batch_size = config.max_batch_size,
            max_buffer_size = config.max_buffer_size,
            sample_probability = config.sample_probability,
            "Metrics pipeline installed"
        );

        state.run = Some(RunContext {
            config: Arc::new(config),
            buffer,
            scheduler: FlushScheduler::new(),
            timer: None,
            timer_seq: 0,
            batcher: Arc::new(batcher),
            submitter: Arc::new(submitter),
            runtime,
        });
        state.lifecycle = Lifecycle::Running;
        Ok(())
    }

    /// Hand a measurement to the buffer.
    ///
    /// Returns `Ok(false)` when the measurement was discarded (disabled,
    /// buffer full, shutting down). Only calling before `install` is an
    /// error.
    pub fn add_measurement(&self, mut measurement: Measurement) -> PipelineResult<bool> {
        let mut state = self.shared.state.lock();
        let lifecycle = state.lifecycle;
        let Some(run) = state.run.as_mut() else {
            return Err(PipelineError::NotInstalled);
        };

        if lifecycle != Lifecycle::Running {
            warn!(measurement = measurement.name(), "Measurement added after shutdown, discarding");
            self.shared.metrics.record_discarded(AdmissionError::Stopping);
            return Ok(false);
        }

        measurement.apply_base_tags(&run.config.base_tags);
        let size = match run.buffer.add(measurement) {
            Ok(size) => size,
            Err(reason) => {
                match reason {
                    AdmissionError::Disabled => trace!("Submission disabled, discarding measurement"),
                    _ => debug!(reason = reason.reason(), "Measurement discarded"),
                }
                self.shared.metrics.record_discarded(reason);
                return Ok(false);
            }
        };
        self.shared.metrics.record_accepted();

        let trigger_size = run.config.trigger_size;
        let actions = run.scheduler.on_measurement_added(size, trigger_size);
        if self.apply(run, actions) {
            debug!(size, trigger_size, "Trigger size reached, flushing");
            let cycle = Self::take_cycle(run);
            let pipeline = self.clone();
            run.runtime.spawn(async move {
                pipeline.execute(cycle).await;
            });
        }
        Ok(true)
    }

    /// Run one flush cycle now, regardless of trigger or interval state.
    ///
    /// If a cycle is already running, waits for it to finish and then runs
    /// its own. Afterwards the scheduler makes its normal post-flush
    /// transition.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> PipelineResult<FlushReport> {
        loop {
            let done = self.shared.cycle_done.notified();
            let started = {
                let mut state = self.shared.state.lock();
                let Some(run) = state.run.as_mut() else {
                    return Err(PipelineError::NotInstalled);
                };
                match run.scheduler.begin_forced_flush() {
                    ForcedFlush::Started(actions) => {
                        self.apply(run, actions);
                        Some(Self::take_cycle(run))
                    }
                    ForcedFlush::Busy => None,
                }
            };
            match started {
                Some(cycle) => return Ok(self.execute(cycle).await),
                None => {
                    trace!("Flush cycle in progress, waiting");
                    done.await;
                }
            }
        }
    }

    /// Stop accepting measurements and flush everything still buffered.
    ///
    /// Returns once the buffer is empty and the scheduler is idle.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> PipelineResult<FlushReport> {
        {
            let mut state = self.shared.state.lock();
            match state.lifecycle {
                Lifecycle::NotInstalled => return Err(PipelineError::NotInstalled),
                Lifecycle::Stopped => return Ok(FlushReport::default()),
                Lifecycle::Running | Lifecycle::Stopping => {}
            }
            state.lifecycle = Lifecycle::Stopping;
            if let Some(run) = state.run.as_mut() {
                info!(buffered = run.buffer.size(), "Shutting down metrics pipeline");
                let actions = run.scheduler.on_shutdown();
                self.apply(run, actions);
            }
        }

        let mut report = FlushReport::default();
        loop {
            report.merge(self.flush().await?);
            let settled = {
                let state = self.shared.state.lock();
                state.run.as_ref().map_or(true, |run| {
                    run.buffer.is_empty() && run.scheduler.state() == SchedulerState::Idle
                })
            };
            if settled {
                break;
            }
        }

        self.shared.state.lock().lifecycle = Lifecycle::Stopped;
        info!(
            delivered = report.delivered,
            failed = report.failed,
            sampled_out = report.batches_sampled_out,
            "Metrics pipeline stopped"
        );
        Ok(report)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.state.lock().lifecycle
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.shared
            .state
            .lock()
            .run
            .as_ref()
            .map_or(SchedulerState::Idle, |run| run.scheduler.state())
    }

    /// Measurements currently buffered
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().run.as_ref().map_or(0, |run| run.buffer.size())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }

    /// Carry out scheduler actions. Returns whether a flush cycle must start.
    fn apply(&self, run: &mut RunContext, actions: Vec<SchedulerAction>) -> bool {
        let mut start_flush = false;
        for action in actions {
            match action {
                SchedulerAction::ArmTimer => self.arm_timer(run),
                SchedulerAction::CancelTimer => {
                    if let Some((_, token)) = run.timer.take() {
                        token.cancel();
                    }
                }
                SchedulerAction::StartFlush => start_flush = true,
            }
        }
        start_flush
    }

    fn arm_timer(&self, run: &mut RunContext) {
        run.timer_seq += 1;
        let id = run.timer_seq;
        let token = CancellationToken::new();
        if let Some((_, stale)) = run.timer.replace((id, token.clone())) {
            stale.cancel();
        }

        let interval = run.config.interval();
        let pipeline = self.clone();
        run.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(interval) => pipeline.on_timer_fired(id).await,
            }
        });
    }

    async fn on_timer_fired(&self, id: u64) {
        let cycle = {
            let mut state = self.shared.state.lock();
            let Some(run) = state.run.as_mut() else {
                return;
            };
            // A timer cancelled or replaced after its sleep elapsed must not flush.
            if !matches!(run.timer, Some((armed, _)) if armed == id) {
                return;
            }
            run.timer = None;
            let actions = run.scheduler.on_timer_fired();
            if !self.apply(run, actions) {
                return;
            }
            Self::take_cycle(run)
        };
        debug!("Flush interval elapsed");
        self.execute(cycle).await;
    }

    fn take_cycle(run: &mut RunContext) -> Cycle {
        let mut drained = Vec::new();
        for database in run.buffer.databases_present() {
            let measurements = run.buffer.drain(&database, usize::MAX);
            drained.push((database, measurements));
        }
        Cycle {
            drained,
            batcher: Arc::clone(&run.batcher),
            submitter: Arc::clone(&run.submitter),
            concurrency: run.config.max_concurrent_writes,
        }
    }

    /// Submit a drained cycle, then make the post-flush transition.
    async fn execute(&self, cycle: Cycle) -> FlushReport {
        let metrics = &self.shared.metrics;
        metrics.record_flush_cycle();

        let Cycle { drained, batcher, submitter, concurrency } = cycle;
        let drained_count: usize = drained.iter().map(|(_, m)| m.len()).sum();
        let batcher = &batcher;
        let submitter = &submitter;

        let per_database: Vec<FlushReport> = stream::iter(drained)
            .map(|(database, measurements)| async move {
                let mut report = FlushReport::default();
                for sampled in batcher.split(&database, measurements) {
                    match sampled {
                        SampledBatch::Keep(batch) => report.record(submitter.submit(batch).await),
                        SampledBatch::Drop(batch) => {
                            debug!(
                                batch_id = %batch.id(),
                                database = %database,
                                count = batch.len(),
                                "Batch sampled out"
                            );
                            metrics.record_sampled_out(batch.len());
                            report.batches_sampled_out += 1;
                        }
                    }
                }
                report
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = FlushReport { cycles: 1, drained: drained_count, ..Default::default() };
        for part in per_database {
            report.merge(part);
        }

        {
            let mut state = self.shared.state.lock();
            if let Some(run) = state.run.as_mut() {
                let actions = run.scheduler.on_flush_complete(run.buffer.is_empty());
                self.apply(run, actions);
            }
        }
        self.shared.cycle_done.notify_waiters();

        if report.drained > 0 {
            debug!(
                drained = report.drained,
                delivered = report.delivered,
                failed = report.failed,
                sampled_out = report.batches_sampled_out,
                "Flush cycle complete"
            );
        }
        report
    }
}

impl std::fmt::Debug for MetricsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsPipeline")
            .field("lifecycle", &self.lifecycle())
            .field("scheduler_state", &self.scheduler_state())
            .field("buffered", &self.buffered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::sync::{TransportError, WriteResponse};

    struct AcceptAll;

    #[async_trait]
    impl LineWriter for AcceptAll {
        async fn write(&self, _database: &str, _body: String) -> Result<WriteResponse, TransportError> {
            Ok(WriteResponse::new(204, ""))
        }
    }

    fn pipeline() -> MetricsPipeline {
        MetricsPipeline::new(Arc::new(AcceptAll))
    }

    #[test]
    fn install_outside_runtime_fails() {
        assert_eq!(pipeline().install(PipelineConfig::default()), Err(PipelineError::NoRuntime));
    }

    #[test]
    fn operations_before_install_are_errors() {
        let pipeline = pipeline();
        let measurement = Measurement::new("db", "m").with_field("v", 1_i64);
        assert_eq!(pipeline.add_measurement(measurement), Err(PipelineError::NotInstalled));

        tokio_test::block_on(async {
            assert_eq!(pipeline.flush().await, Err(PipelineError::NotInstalled));
            assert_eq!(pipeline.shutdown().await, Err(PipelineError::NotInstalled));
        });
        assert_eq!(pipeline.lifecycle(), Lifecycle::NotInstalled);
    }

    #[tokio::test]
    async fn second_install_is_rejected_until_shutdown() {
        let pipeline = pipeline();
        pipeline.install(PipelineConfig::default()).unwrap();
        assert_eq!(
            pipeline.install(PipelineConfig::default()),
            Err(PipelineError::AlreadyInstalled)
        );

        pipeline.shutdown().await.unwrap();
        assert_eq!(pipeline.lifecycle(), Lifecycle::Stopped);
        assert!(pipeline.install(PipelineConfig::default()).is_ok());
        assert_eq!(pipeline.lifecycle(), Lifecycle::Running);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_install() {
        let config = PipelineConfig { sample_probability: 3.0, ..Default::default() };
        assert!(matches!(pipeline().install(config), Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn base_tags_do_not_override_measurement_tags() {
        let writer = Arc::new(AcceptAll);
        let pipeline = MetricsPipeline::new(writer);
        let mut config = PipelineConfig::default();
        config.set_base_tag("hostname", "box-1");
        config.set_base_tag("environment", "test");
        pipeline.install(config).unwrap();

        let measurement =
            Measurement::new("db", "m").with_tag("environment", "prod").with_field("v", 1_i64);
        assert_eq!(pipeline.add_measurement(measurement), Ok(true));

        let buffered = {
            let mut state = pipeline.shared.state.lock();
            let run = state.run.as_mut().unwrap();
            let mut drained = run.buffer.drain("db", 1);
            drained.remove(0)
        };
        let tags: Vec<(String, String)> =
            buffered.tags().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        assert!(tags.contains(&("environment".into(), "prod".into())));
        assert!(tags.contains(&("hostname".into(), "box-1".into())));
    }

    #[test]
    fn reports_merge_counts() {
        let mut total = FlushReport::default();
        let mut part = FlushReport { cycles: 1, drained: 4, ..Default::default() };
        part.record(SubmitOutcome::Sent { count: 2 });
        part.record(SubmitOutcome::Retried { sent: 1, failed: 1 });
        total.merge(part);
        total.merge(part);

        assert_eq!(total.cycles, 2);
        assert_eq!(total.batches_submitted, 4);
        assert_eq!(total.delivered, 6);
        assert_eq!(total.failed, 2);
    }
}
