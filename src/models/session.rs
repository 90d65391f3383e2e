use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::TimerMode;

/// One naturally completed work interval. Appended to the session log and
/// never changed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default = "new_record_id")]
    pub id: String,
    #[serde(alias = "date")]
    pub timestamp_utc: DateTime<Utc>,
    #[serde(alias = "duration")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub mode: TimerMode,
}

impl SessionRecord {
    pub fn work(completed_at: DateTime<Utc>, duration_minutes: u32) -> Self {
        Self {
            id: new_record_id(),
            timestamp_utc: completed_at,
            duration_minutes,
            mode: TimerMode::Work,
        }
    }

    /// Records with a zero duration or a non-work mode never come out of the
    /// timer; they only appear when the stored log was edited by hand.
    pub fn is_well_formed(&self) -> bool {
        self.duration_minutes > 0 && self.mode == TimerMode::Work
    }
}

fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}
