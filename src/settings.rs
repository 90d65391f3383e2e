use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::SettingsError,
    log_warn,
    store::{read_json, write_json, KeyValueStore, SETTINGS_KEY},
    timer::TimerMode,
};

const ENABLE_LOGS: bool = true;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;
pub const DEFAULT_WORK_SOUND: &str = "alarm1";
pub const DEFAULT_BREAK_SOUND: &str = "bell";
pub const DEFAULT_VOLUME: f32 = 0.5;

// Older builds of the widget stored durations under these names.
const WORK_KEYS: &[&str] = &["workMinutes", "workDuration", "workTime"];
const SHORT_BREAK_KEYS: &[&str] = &["shortBreakMinutes", "shortBreakDuration", "breakTime"];
const LONG_BREAK_KEYS: &[&str] = &["longBreakMinutes", "longBreakDuration"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    pub work_minutes: u32,
    pub short_break_minutes: u32,
    pub long_break_minutes: u32,
    /// Played when a work interval ends.
    pub work_sound: String,
    /// Played when a break ends.
    pub break_sound: String,
    pub volume: f32,
    /// Start the next interval automatically after a natural completion.
    pub auto_resume: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            long_break_minutes: DEFAULT_LONG_BREAK_MINUTES,
            work_sound: DEFAULT_WORK_SOUND.into(),
            break_sound: DEFAULT_BREAK_SOUND.into(),
            volume: DEFAULT_VOLUME,
            auto_resume: true,
        }
    }
}

impl TimerConfig {
    pub fn minutes_for(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Work => self.work_minutes,
            TimerMode::ShortBreak => self.short_break_minutes,
            TimerMode::LongBreak => self.long_break_minutes,
        }
    }

    pub fn seconds_for(&self, mode: TimerMode) -> i64 {
        i64::from(self.minutes_for(mode)) * 60
    }

    /// Alarm to play when an interval of `finished` mode ends.
    pub fn sound_for(&self, finished: TimerMode) -> &str {
        if finished.is_break() {
            &self.break_sound
        } else {
            &self.work_sound
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (field, minutes) in [
            ("workMinutes", self.work_minutes),
            ("shortBreakMinutes", self.short_break_minutes),
            ("longBreakMinutes", self.long_break_minutes),
        ] {
            if minutes == 0 {
                return Err(SettingsError::ZeroDuration { field });
            }
        }

        if !self.volume.is_finite() || !(0.0..=1.0).contains(&self.volume) {
            return Err(SettingsError::VolumeOutOfRange(self.volume));
        }

        for (field, sound) in [("workSound", &self.work_sound), ("breakSound", &self.break_sound)] {
            if sound.trim().is_empty() {
                return Err(SettingsError::EmptySoundId { field });
            }
        }

        Ok(())
    }

    /// Merges whatever is usable in `stored` over the defaults, one field at a
    /// time. A field that is missing, mistyped or out of range keeps its default.
    fn merge_stored(stored: &Map<String, Value>) -> Self {
        let defaults = Self::default();

        Self {
            work_minutes: pick(stored, WORK_KEYS, parse_minutes)
                .unwrap_or(defaults.work_minutes),
            short_break_minutes: pick(stored, SHORT_BREAK_KEYS, parse_minutes)
                .unwrap_or(defaults.short_break_minutes),
            long_break_minutes: pick(stored, LONG_BREAK_KEYS, parse_minutes)
                .unwrap_or(defaults.long_break_minutes),
            work_sound: pick(stored, &["workSound"], parse_sound).unwrap_or(defaults.work_sound),
            break_sound: pick(stored, &["breakSound"], parse_sound)
                .unwrap_or(defaults.break_sound),
            volume: pick(stored, &["volume"], parse_volume).unwrap_or(defaults.volume),
            auto_resume: pick(stored, &["autoResume"], Value::as_bool)
                .unwrap_or(defaults.auto_resume),
        }
    }
}

fn pick<T>(
    stored: &Map<String, Value>,
    keys: &[&str],
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let mut present = keys
        .iter()
        .filter_map(|key| stored.get(*key).map(|value| (key, value)));
    let mut rejected = None;

    let found = present.find_map(|(key, value)| {
        let parsed = parse(value);
        if parsed.is_none() {
            rejected.get_or_insert(*key);
        }
        parsed
    });

    if found.is_none() {
        if let Some(key) = rejected {
            log_warn!("Ignoring stored setting '{key}', falling back to default");
        }
    }
    found
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn parse_minutes(value: &Value) -> Option<u32> {
    if let Some(whole) = value.as_u64() {
        return u32::try_from(whole).ok().filter(|minutes| *minutes > 0);
    }

    let number = as_number(value)?;
    if number.fract() != 0.0 || number < 1.0 || number > f64::from(u32::MAX) {
        return None;
    }
    Some(number as u32)
}

fn parse_volume(value: &Value) -> Option<f32> {
    as_number(value)
        .filter(|volume| volume.is_finite())
        .map(|volume| volume.clamp(0.0, 1.0) as f32)
}

fn parse_sound(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|sound| !sound.is_empty())
        .map(str::to_string)
}

/// Loads and saves [`TimerConfig`] under the `settings` key. Saving does not
/// touch any running timer.
#[derive(Clone)]
pub struct SettingsManager {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> TimerConfig {
        match read_json(self.store.as_ref(), SETTINGS_KEY) {
            Some(Value::Object(stored)) => TimerConfig::merge_stored(&stored),
            Some(_) => {
                log_warn!("Stored settings are not an object, using defaults");
                TimerConfig::default()
            }
            None => TimerConfig::default(),
        }
    }

    pub fn save(&self, config: &TimerConfig) -> Result<(), SettingsError> {
        config.validate()?;
        write_json(self.store.as_ref(), SETTINGS_KEY, config)?;
        Ok(())
    }
}
