//! Scheduler and pipeline lifecycle states

use serde::{Deserialize, Serialize};

use crate::impl_state_conversions;

/// Flush scheduler state. At most one timer is armed and at most one flush
/// cycle runs at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No timer armed, no flush running
    Idle,
    /// Interval timer running
    TimerArmed,
    /// A drain + submit cycle is in progress
    Flushing,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::Idle
    }
}

impl_state_conversions!(SchedulerState {
    Idle => "idle",
    TimerArmed => "timer_armed",
    Flushing => "flushing",
});

/// Lifecycle of a pipeline context object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    NotInstalled,
    Running,
    Stopping,
    Stopped,
}

impl_state_conversions!(Lifecycle {
    NotInstalled => "not_installed",
    Running => "running",
    Stopping => "stopping",
    Stopped => "stopped",
});
