use serde::Serialize;

use crate::models::SessionRecord;

use super::{TimerMode, TimerState, TimerStatus};

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub mode: TimerMode,
    pub status: TimerStatus,
    /// Never negative.
    pub remaining_seconds: i64,
    pub total_seconds: i64,
    pub display: String,
    pub progress: f64,
}

impl From<&TimerState> for TimerSnapshot {
    fn from(state: &TimerState) -> Self {
        Self {
            mode: state.mode,
            status: state.status,
            remaining_seconds: state.display_seconds(),
            total_seconds: state.total_seconds,
            display: state.display(),
            progress: state.progress(),
        }
    }
}

/// Everything the timer publishes to subscribers.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    /// Start, pause, reset, mode switch or a settings change that moved the
    /// countdown.
    StateChanged { snapshot: TimerSnapshot },
    /// One second elapsed.
    Tick { snapshot: TimerSnapshot },
    /// An interval ran out. `record` is set for work intervals.
    IntervalCompleted {
        finished: TimerMode,
        next: TimerMode,
        record: Option<SessionRecord>,
        snapshot: TimerSnapshot,
    },
}
