//! Flush scheduler state machine
//!
//! Pure transitions, no timers and no I/O. The pipeline feeds events in and
//! carries out the returned [`SchedulerAction`]s against whatever timer
//! primitive it owns.
//!
//! ```text
//!   Idle ──add──► TimerArmed ──timer──► Flushing ──done, empty──► Idle
//!    │                │                   ▲   │
//!    └─add ≥ trigger──┴───add ≥ trigger───┘   └─done, not empty──► TimerArmed
//! ```

use metricbuf_domain::SchedulerState;

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerAction {
    /// Start the single interval timer
    ArmTimer,
    /// Cancel the outstanding interval timer
    CancelTimer,
    /// Run one drain-and-submit cycle
    StartFlush,
}

/// Result of asking for an out-of-band flush
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForcedFlush {
    /// The caller now owns the flush cycle and must run it
    Started(Vec<SchedulerAction>),
    /// A cycle is already running; wait for it to complete
    Busy,
}

/// Decides when buffered measurements are flushed
#[derive(Debug, Default)]
pub struct FlushScheduler {
    state: SchedulerState,
}

impl FlushScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// A measurement was accepted and the buffer now holds `buffer_size`.
    pub fn on_measurement_added(
        &mut self,
        buffer_size: usize,
        trigger_size: usize,
    ) -> Vec<SchedulerAction> {
        match self.state {
            SchedulerState::Flushing => Vec::new(),
            state if buffer_size >= trigger_size => {
                self.state = SchedulerState::Flushing;
                if state == SchedulerState::TimerArmed {
                    vec![SchedulerAction::CancelTimer, SchedulerAction::StartFlush]
                } else {
                    vec![SchedulerAction::StartFlush]
                }
            }
            SchedulerState::Idle => {
                self.state = SchedulerState::TimerArmed;
                vec![SchedulerAction::ArmTimer]
            }
            SchedulerState::TimerArmed => Vec::new(),
        }
    }

    /// The interval timer elapsed. Stale firings are ignored.
    pub fn on_timer_fired(&mut self) -> Vec<SchedulerAction> {
        if self.state != SchedulerState::TimerArmed {
            return Vec::new();
        }
        self.state = SchedulerState::Flushing;
        vec![SchedulerAction::StartFlush]
    }

    /// A flush cycle finished. Whatever arrived or remained during the cycle
    /// gets a live timer.
    pub fn on_flush_complete(&mut self, buffer_empty: bool) -> Vec<SchedulerAction> {
        if self.state != SchedulerState::Flushing {
            return Vec::new();
        }
        if buffer_empty {
            self.state = SchedulerState::Idle;
            Vec::new()
        } else {
            self.state = SchedulerState::TimerArmed;
            vec![SchedulerAction::ArmTimer]
        }
    }

    /// Claim a flush cycle regardless of trigger or interval state.
    pub fn begin_forced_flush(&mut self) -> ForcedFlush {
        match self.state {
            SchedulerState::Flushing => ForcedFlush::Busy,
            SchedulerState::TimerArmed => {
                self.state = SchedulerState::Flushing;
                ForcedFlush::Started(vec![SchedulerAction::CancelTimer])
            }
            SchedulerState::Idle => {
                self.state = SchedulerState::Flushing;
                ForcedFlush::Started(Vec::new())
            }
        }
    }

    /// Disarm ahead of the final flush. A running cycle is left alone.
    pub fn on_shutdown(&mut self) -> Vec<SchedulerAction> {
        if self.state == SchedulerState::TimerArmed {
            self.state = SchedulerState::Idle;
            return vec![SchedulerAction::CancelTimer];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SchedulerAction::*;

    #[test]
    fn first_add_arms_a_single_timer() {
        let mut scheduler = FlushScheduler::new();
        assert_eq!(scheduler.on_measurement_added(1, 10), vec![ArmTimer]);
        assert_eq!(scheduler.state(), SchedulerState::TimerArmed);
        assert!(scheduler.on_measurement_added(2, 10).is_empty());
        assert!(scheduler.on_measurement_added(3, 10).is_empty());
    }

    #[test]
    fn reaching_trigger_cancels_timer_and_flushes() {
        let mut scheduler = FlushScheduler::new();
        scheduler.on_measurement_added(1, 3);
        scheduler.on_measurement_added(2, 3);
        assert_eq!(scheduler.on_measurement_added(3, 3), vec![CancelTimer, StartFlush]);
        assert_eq!(scheduler.state(), SchedulerState::Flushing);
    }

    #[test]
    fn trigger_from_idle_flushes_without_timer() {
        let mut scheduler = FlushScheduler::new();
        assert_eq!(scheduler.on_measurement_added(1, 1), vec![StartFlush]);
    }

    #[test]
    fn flush_in_progress_is_not_preempted() {
        let mut scheduler = FlushScheduler::new();
        scheduler.on_measurement_added(5, 5);
        assert!(scheduler.on_measurement_added(6, 5).is_empty());
        assert!(scheduler.on_timer_fired().is_empty());
        assert_eq!(scheduler.begin_forced_flush(), ForcedFlush::Busy);
    }

    #[test]
    fn timer_fires_only_when_armed() {
        let mut scheduler = FlushScheduler::new();
        assert!(scheduler.on_timer_fired().is_empty());
        scheduler.on_measurement_added(1, 10);
        assert_eq!(scheduler.on_timer_fired(), vec![StartFlush]);
        assert_eq!(scheduler.state(), SchedulerState::Flushing);
    }

    #[test]
    fn completion_returns_to_idle_or_rearms() {
        let mut scheduler = FlushScheduler::new();
        scheduler.on_measurement_added(1, 1);
        assert!(scheduler.on_flush_complete(true).is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.on_measurement_added(1, 1);
        assert_eq!(scheduler.on_flush_complete(false), vec![ArmTimer]);
        assert_eq!(scheduler.state(), SchedulerState::TimerArmed);
    }

    #[test]
    fn forced_flush_cancels_armed_timer() {
        let mut scheduler = FlushScheduler::new();
        assert_eq!(scheduler.begin_forced_flush(), ForcedFlush::Started(vec![]));
        scheduler.on_flush_complete(true);

        scheduler.on_measurement_added(1, 10);
        assert_eq!(scheduler.begin_forced_flush(), ForcedFlush::Started(vec![CancelTimer]));
        assert_eq!(scheduler.state(), SchedulerState::Flushing);
    }

    #[test]
    fn shutdown_disarms_timer() {
        let mut scheduler = FlushScheduler::new();
        scheduler.on_measurement_added(1, 10);
        assert_eq!(scheduler.on_shutdown(), vec![CancelTimer]);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.on_shutdown().is_empty());
    }
}
