use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    /// Automatic cycle after a natural completion: work alternates with short
    /// breaks. A long break is only entered by an explicit mode switch and is
    /// followed by work.
    pub fn next(self) -> TimerMode {
        match self {
            TimerMode::Work => TimerMode::ShortBreak,
            TimerMode::ShortBreak | TimerMode::LongBreak => TimerMode::Work,
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, TimerMode::Work)
    }

    pub fn label(self) -> &'static str {
        match self {
            TimerMode::Work => "Work",
            TimerMode::ShortBreak => "Short break",
            TimerMode::LongBreak => "Long break",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The timer was not running; nothing changed.
    Idle,
    /// One second elapsed; carries the new remaining value.
    Counting(i64),
    /// The countdown went below zero. The state is stopped and still in the
    /// finished mode; the caller performs the rollover.
    Completed(TimerMode),
}

/// Countdown for one interval. Knows nothing about configuration or
/// persistence; durations are passed in by the owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub status: TimerStatus,
    /// Dips to -1 on the completing tick; use [`display_seconds`](Self::display_seconds)
    /// for anything user facing.
    pub remaining_seconds: i64,
    pub total_seconds: i64,
}

impl TimerState {
    pub fn new(mode: TimerMode, total_seconds: i64) -> Self {
        Self {
            mode,
            status: TimerStatus::Stopped,
            remaining_seconds: total_seconds,
            total_seconds,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Returns false when already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.status = TimerStatus::Running;
        true
    }

    /// Returns false when already stopped. The remaining time is kept as is.
    pub fn pause(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = TimerStatus::Stopped;
        true
    }

    /// Refills the countdown without touching mode or status.
    pub fn reload(&mut self, total_seconds: i64) {
        self.total_seconds = total_seconds;
        self.remaining_seconds = total_seconds;
    }

    pub fn set_mode(&mut self, mode: TimerMode, total_seconds: i64) {
        self.mode = mode;
        self.reload(total_seconds);
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Idle;
        }

        self.remaining_seconds -= 1;
        if self.remaining_seconds < 0 {
            self.status = TimerStatus::Stopped;
            return TickOutcome::Completed(self.mode);
        }
        TickOutcome::Counting(self.remaining_seconds)
    }

    pub fn display_seconds(&self) -> i64 {
        self.remaining_seconds.max(0)
    }

    /// `MM:SS`, minutes keep growing past 99.
    pub fn display(&self) -> String {
        let seconds = self.display_seconds();
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    }

    /// Fraction of the interval already elapsed, in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.total_seconds <= 0 {
            return 0.0;
        }
        let elapsed = self.total_seconds - self.display_seconds();
        (elapsed as f64 / self.total_seconds as f64).clamp(0.0, 1.0)
    }
}
