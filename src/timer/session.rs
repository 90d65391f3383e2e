use std::sync::Arc;

use tokio::sync::broadcast;

use crate::{
    audio::AlarmPlayer,
    error::SettingsError,
    log_error, log_info, log_warn,
    models::SessionRecord,
    notify::{NotificationSink, Severity},
    settings::{SettingsManager, TimerConfig},
    store::SessionLog,
    utils::Clock,
};

use super::{TickOutcome, TimerEvent, TimerMode, TimerSnapshot, TimerState};

const ENABLE_LOGS: bool = true;

const EVENT_CAPACITY: usize = 64;

/// The work/break state machine.
///
/// Synchronous and single-owner: the host (normally [`super::TimerController`])
/// calls [`tick`](Self::tick) once per second while the timer runs. Settings
/// are re-read from the [`SettingsManager`] on start, reset, mode switch and
/// after every completed interval.
pub struct SessionTimer {
    state: TimerState,
    config: TimerConfig,
    settings: SettingsManager,
    log: SessionLog,
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmPlayer>,
    notifier: Option<Arc<dyn NotificationSink>>,
    events: broadcast::Sender<TimerEvent>,
}

impl SessionTimer {
    /// Starts stopped, in work mode, with the configured work duration.
    pub fn new(
        settings: SettingsManager,
        log: SessionLog,
        clock: Arc<dyn Clock>,
        alarm: Arc<dyn AlarmPlayer>,
    ) -> Self {
        let config = settings.load();
        let state = TimerState::new(TimerMode::Work, config.seconds_for(TimerMode::Work));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            state,
            config,
            settings,
            log,
            clock,
            alarm,
            notifier: None,
            events,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot::from(&self.state)
    }

    /// Returns false, doing nothing, when already running.
    pub fn start(&mut self) -> bool {
        if self.state.is_running() {
            return false;
        }

        self.config = self.settings.load();
        self.state.start();
        log_info!(
            "Timer started: {} with {} left",
            self.state.mode.label(),
            self.state.display()
        );
        self.notify("Timer started", Severity::Info);
        self.emit_state_changed();
        true
    }

    /// Returns false, doing nothing, when already stopped.
    pub fn pause(&mut self) -> bool {
        if !self.state.pause() {
            return false;
        }

        log_info!("Timer paused with {} left", self.state.display());
        self.notify("Timer paused", Severity::Info);
        self.emit_state_changed();
        true
    }

    /// Pauses a running timer, starts a stopped one. Returns whether the timer
    /// is running afterwards.
    pub fn toggle(&mut self) -> bool {
        if self.state.is_running() {
            self.pause();
        } else {
            self.start();
        }
        self.state.is_running()
    }

    /// Stops and refills the current mode from the latest settings.
    pub fn reset(&mut self) {
        self.state.pause();
        self.config = self.settings.load();
        self.state.reload(self.config.seconds_for(self.state.mode));

        log_info!("Timer reset to {}", self.state.display());
        self.notify("Timer reset", Severity::Info);
        self.emit_state_changed();
    }

    /// Manual override: jumps to `target` with a full countdown and runs it.
    pub fn switch_mode(&mut self, target: TimerMode) {
        self.state.pause();
        self.config = self.settings.load();
        self.state.set_mode(target, self.config.seconds_for(target));
        self.state.start();

        log_info!("Switched to {}", target.label());
        self.emit_state_changed();
    }

    /// Persists `config`. A stopped timer whose current mode changed length is
    /// refilled; a running countdown is never touched.
    pub fn update_settings(&mut self, config: TimerConfig) -> Result<(), SettingsError> {
        self.settings.save(&config)?;

        let mode = self.state.mode;
        let previous = std::mem::replace(&mut self.config, config);
        if !self.state.is_running() && previous.minutes_for(mode) != self.config.minutes_for(mode)
        {
            self.state.reload(self.config.seconds_for(mode));
            self.emit_state_changed();
        }
        Ok(())
    }

    pub fn tick(&mut self) -> TickOutcome {
        let outcome = self.state.tick();
        match outcome {
            TickOutcome::Idle => {}
            TickOutcome::Counting(_) => {
                let _ = self.events.send(TimerEvent::Tick {
                    snapshot: self.snapshot(),
                });
            }
            TickOutcome::Completed(finished) => self.complete(finished),
        }
        outcome
    }

    fn complete(&mut self, finished: TimerMode) {
        let record = match finished {
            TimerMode::Work => self.record_work_session(),
            TimerMode::ShortBreak | TimerMode::LongBreak => None,
        };

        self.play_alarm(finished);

        self.config = self.settings.load();
        let next = finished.next();
        self.state.set_mode(next, self.config.seconds_for(next));
        if self.config.auto_resume {
            self.state.start();
        }

        log_info!(
            "{} finished, next up: {}",
            finished.label(),
            next.label()
        );
        let message = match finished {
            TimerMode::Work => "Work session complete! Time for a break",
            TimerMode::ShortBreak | TimerMode::LongBreak => "Break is over! Back to work",
        };
        self.notify(message, Severity::Success);

        let _ = self.events.send(TimerEvent::IntervalCompleted {
            finished,
            next,
            record,
            snapshot: self.snapshot(),
        });
    }

    fn record_work_session(&self) -> Option<SessionRecord> {
        // Length of the interval that just ran, which is what was configured
        // when it started.
        let minutes = u32::try_from(self.state.total_seconds / 60)
            .ok()
            .filter(|minutes| *minutes > 0)
            .unwrap_or(self.config.work_minutes);
        let record = SessionRecord::work(self.clock.now(), minutes);

        match self.log.append(&record) {
            Ok(()) => Some(record),
            Err(err) => {
                log_error!("Failed to append session record: {err:#}");
                self.notify("Could not save the finished session", Severity::Error);
                None
            }
        }
    }

    fn play_alarm(&self, finished: TimerMode) {
        let sound = self.config.sound_for(finished);
        if let Err(err) = self.alarm.play(sound, self.config.volume) {
            log_warn!("Could not play alarm '{sound}': {err:#}");
            self.notify("Could not play the alarm sound", Severity::Error);
        }
    }

    fn notify(&self, message: &str, severity: Severity) {
        if let Some(notifier) = &self.notifier {
            notifier.notify(message, severity);
        }
    }

    fn emit_state_changed(&self) {
        let _ = self.events.send(TimerEvent::StateChanged {
            snapshot: self.snapshot(),
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        store::{KeyValueStore, MemoryStore, SESSION_LOG_KEY},
        timer::TimerStatus,
        utils::ManualClock,
    };

    #[derive(Default)]
    struct RecordingAlarm {
        played: Mutex<Vec<(String, f32)>>,
        broken: bool,
    }

    impl AlarmPlayer for RecordingAlarm {
        fn play(&self, sound_id: &str, volume: f32) -> Result<()> {
            if self.broken {
                return Err(anyhow!("unsupported format"));
            }
            self.played
                .lock()
                .unwrap()
                .push((sound_id.to_string(), volume));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<(String, Severity)>>,
    }

    impl NotificationSink for RecordingNotifier {
        fn notify(&self, message: &str, severity: Severity) {
            self.seen
                .lock()
                .unwrap()
                .push((message.to_string(), severity));
        }
    }

    struct Harness {
        timer: SessionTimer,
        store: Arc<MemoryStore>,
        clock: ManualClock,
        alarm: Arc<RecordingAlarm>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Harness {
        fn with_config(config: TimerConfig, broken_alarm: bool) -> Self {
            let store = Arc::new(MemoryStore::new());
            SettingsManager::new(store.clone()).save(&config).unwrap();

            let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
            let alarm = Arc::new(RecordingAlarm {
                broken: broken_alarm,
                ..RecordingAlarm::default()
            });
            let notifier = Arc::new(RecordingNotifier::default());

            let timer = SessionTimer::new(
                SettingsManager::new(store.clone()),
                SessionLog::new(store.clone()),
                Arc::new(clock.clone()),
                alarm.clone(),
            )
            .with_notifier(notifier.clone());

            Self {
                timer,
                store,
                clock,
                alarm,
                notifier,
            }
        }

        fn minutes(work: u32, short_break: u32) -> Self {
            Self::with_config(
                TimerConfig {
                    work_minutes: work,
                    short_break_minutes: short_break,
                    ..TimerConfig::default()
                },
                false,
            )
        }

        fn advance(&mut self, ticks: i64) -> Vec<TickOutcome> {
            (0..ticks).map(|_| self.timer.tick()).collect()
        }

        fn records(&self) -> Vec<SessionRecord> {
            SessionLog::new(self.store.clone()).load()
        }
    }

    fn completions(outcomes: &[TickOutcome]) -> usize {
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, TickOutcome::Completed(_)))
            .count()
    }

    #[test]
    fn new_timer_shows_full_work_interval() {
        let harness = Harness::minutes(25, 5);
        let snapshot = harness.timer.snapshot();
        assert_eq!(snapshot.mode, TimerMode::Work);
        assert_eq!(snapshot.status, TimerStatus::Stopped);
        assert_eq!(snapshot.remaining_seconds, 25 * 60);
        assert_eq!(snapshot.display, "25:00");
    }

    #[test]
    fn countdown_completes_once_after_the_zero_frame() {
        for work in 1..=3u32 {
            let mut harness = Harness::minutes(work, 5);
            let total = i64::from(work) * 60;
            harness.timer.start();

            let before = harness.advance(total - 1);
            assert_eq!(completions(&before), 0);
            assert_eq!(harness.timer.state().remaining_seconds, 1);

            assert_eq!(harness.timer.tick(), TickOutcome::Counting(0));
            assert_eq!(harness.timer.snapshot().display, "00:00");
            assert!(harness.records().is_empty());

            assert_eq!(harness.timer.tick(), TickOutcome::Completed(TimerMode::Work));
            assert_eq!(harness.records().len(), 1);
        }
    }

    #[test]
    fn one_minute_work_interval_records_one_session() {
        let mut harness = Harness::minutes(1, 5);
        harness.timer.start();

        harness.advance(59);
        assert!(harness.records().is_empty());
        harness.advance(1);
        assert!(harness.records().is_empty());

        harness.clock.advance(chrono::Duration::seconds(61));
        harness.advance(1);

        let records = harness.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].duration_minutes, 1);
        assert_eq!(records[0].mode, TimerMode::Work);
        assert_eq!(records[0].timestamp_utc, harness.clock.now());
    }

    #[test]
    fn completion_rolls_over_and_auto_resumes() {
        let mut harness = Harness::minutes(1, 2);
        let mut events = harness.timer.subscribe();
        harness.timer.start();
        harness.advance(61);

        let state = harness.timer.state();
        assert_eq!(state.mode, TimerMode::ShortBreak);
        assert_eq!(state.remaining_seconds, 2 * 60);
        assert!(state.is_running());

        assert_eq!(
            harness.alarm.played.lock().unwrap().as_slice(),
            &[("alarm1".to_string(), 0.5)]
        );

        let mut completed = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let TimerEvent::IntervalCompleted {
                finished,
                next,
                record,
                ..
            } = event
            {
                completed.push((finished, next, record.is_some()));
            }
        }
        assert_eq!(completed, vec![(TimerMode::Work, TimerMode::ShortBreak, true)]);

        // The break runs out too, without adding a record.
        let outcomes = harness.advance(2 * 60 + 1);
        assert_eq!(completions(&outcomes), 1);
        assert_eq!(harness.timer.state().mode, TimerMode::Work);
        assert_eq!(harness.records().len(), 1);
        assert_eq!(harness.alarm.played.lock().unwrap()[1].0, "bell");
    }

    #[test]
    fn auto_resume_can_be_disabled() {
        let mut harness = Harness::with_config(
            TimerConfig {
                work_minutes: 1,
                auto_resume: false,
                ..TimerConfig::default()
            },
            false,
        );
        harness.timer.start();
        harness.advance(61);

        assert_eq!(harness.timer.state().mode, TimerMode::ShortBreak);
        assert!(!harness.timer.is_running());
        assert_eq!(harness.advance(10), vec![TickOutcome::Idle; 10]);
    }

    #[test]
    fn pausing_only_loses_running_ticks() {
        let mut harness = Harness::minutes(25, 5);
        let total = 25 * 60;

        for _ in 0..5 {
            harness.timer.start();
            harness.advance(7);
            harness.timer.pause();
            assert_eq!(harness.advance(3), vec![TickOutcome::Idle; 3]);
        }
        assert_eq!(harness.timer.state().remaining_seconds, total - 35);
    }

    #[test]
    fn start_is_idempotent() {
        let mut harness = Harness::minutes(25, 5);
        assert!(harness.timer.start());
        assert!(!harness.timer.start());
        harness.advance(1);
        assert_eq!(harness.timer.state().remaining_seconds, 25 * 60 - 1);
        assert!(harness.timer.pause());
        assert!(!harness.timer.pause());
    }

    #[test]
    fn toggle_flips_running() {
        let mut harness = Harness::minutes(25, 5);
        assert!(harness.timer.toggle());
        assert!(!harness.timer.toggle());
        assert!(harness.timer.toggle());
    }

    #[test]
    fn reset_picks_up_settings_changed_elsewhere() {
        let mut harness = Harness::minutes(25, 5);
        harness.timer.start();
        harness.advance(90);

        SettingsManager::new(harness.store.clone())
            .save(&TimerConfig {
                work_minutes: 40,
                ..TimerConfig::default()
            })
            .unwrap();
        assert_eq!(harness.timer.state().remaining_seconds, 25 * 60 - 90);

        harness.timer.reset();
        let state = harness.timer.state();
        assert_eq!(state.mode, TimerMode::Work);
        assert_eq!(state.remaining_seconds, 40 * 60);
        assert!(!state.is_running());
    }

    #[test]
    fn manual_interruptions_never_record() {
        let mut harness = Harness::minutes(1, 5);
        harness.timer.start();
        harness.advance(59);
        harness.timer.pause();
        harness.timer.reset();
        harness.timer.start();
        harness.advance(60);
        harness.timer.switch_mode(TimerMode::ShortBreak);

        assert!(harness.records().is_empty());
        assert!(harness.store.get(SESSION_LOG_KEY).unwrap().is_none());
        assert!(harness.alarm.played.lock().unwrap().is_empty());
    }

    #[test]
    fn switch_mode_runs_a_full_interval() {
        let mut harness = Harness::minutes(25, 5);
        harness.timer.start();
        harness.advance(10);

        harness.timer.switch_mode(TimerMode::LongBreak);
        let state = harness.timer.state();
        assert_eq!(state.mode, TimerMode::LongBreak);
        assert_eq!(state.remaining_seconds, 15 * 60);
        assert!(state.is_running());

        let outcomes = harness.advance(15 * 60 + 1);
        assert_eq!(outcomes.last(), Some(&TickOutcome::Completed(TimerMode::LongBreak)));
        assert_eq!(harness.timer.state().mode, TimerMode::Work);
        assert!(harness.records().is_empty());
    }

    #[test]
    fn settings_changes_leave_a_running_countdown_alone() {
        let mut harness = Harness::minutes(25, 5);
        harness.timer.start();
        harness.advance(30);

        let mut config = harness.timer.config().clone();
        config.short_break_minutes = 10;
        config.work_minutes = 50;
        harness.timer.update_settings(config).unwrap();

        assert_eq!(harness.timer.state().remaining_seconds, 25 * 60 - 30);
        assert_eq!(harness.timer.state().total_seconds, 25 * 60);
    }

    #[test]
    fn settings_changes_refill_a_stopped_current_mode() {
        let mut harness = Harness::minutes(25, 5);
        harness.timer.start();
        harness.advance(30);
        harness.timer.pause();

        let mut config = harness.timer.config().clone();
        config.short_break_minutes = 10;
        harness.timer.update_settings(config.clone()).unwrap();
        assert_eq!(harness.timer.state().remaining_seconds, 25 * 60 - 30);

        config.work_minutes = 30;
        harness.timer.update_settings(config).unwrap();
        assert_eq!(harness.timer.state().remaining_seconds, 30 * 60);
        assert!(!harness.timer.is_running());
    }

    #[test]
    fn rejected_settings_change_nothing() {
        let mut harness = Harness::minutes(25, 5);
        let bad = TimerConfig {
            work_minutes: 0,
            ..TimerConfig::default()
        };

        assert!(harness.timer.update_settings(bad).is_err());
        assert_eq!(harness.timer.config().work_minutes, 25);
        assert_eq!(harness.timer.state().remaining_seconds, 25 * 60);
    }

    #[test]
    fn recorded_length_is_the_interval_that_ran() {
        let mut harness = Harness::minutes(1, 5);
        harness.timer.start();
        harness.advance(30);

        let mut config = harness.timer.config().clone();
        config.work_minutes = 2;
        harness.timer.update_settings(config).unwrap();
        harness.advance(31);

        assert_eq!(harness.records()[0].duration_minutes, 1);
        // The next work interval uses the new length.
        assert_eq!(harness.timer.config().work_minutes, 2);
    }

    #[test]
    fn alarm_failures_are_reported_not_fatal() {
        let mut harness = Harness::with_config(
            TimerConfig {
                work_minutes: 1,
                ..TimerConfig::default()
            },
            true,
        );
        harness.timer.start();
        harness.advance(61);

        assert_eq!(harness.records().len(), 1);
        assert_eq!(harness.timer.state().mode, TimerMode::ShortBreak);
        assert!(harness.timer.is_running());

        let seen = harness.notifier.seen.lock().unwrap();
        assert!(seen
            .iter()
            .any(|(message, severity)| *severity == Severity::Error && message.contains("alarm")));
        assert!(seen.iter().any(|(_, severity)| *severity == Severity::Success));
    }

    #[test]
    fn events_follow_operations() {
        let mut harness = Harness::minutes(25, 5);
        let mut events = harness.timer.subscribe();

        harness.timer.start();
        harness.timer.tick();
        harness.timer.pause();

        let first = events.try_recv().unwrap();
        assert!(matches!(
            first,
            TimerEvent::StateChanged { ref snapshot } if snapshot.status == TimerStatus::Running
        ));
        assert_eq!(
            events.try_recv().unwrap(),
            TimerEvent::Tick {
                snapshot: harness_snapshot(25 * 60 - 1, TimerStatus::Running)
            }
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            TimerEvent::StateChanged { ref snapshot } if snapshot.status == TimerStatus::Stopped
        ));
        assert!(events.try_recv().is_err());
    }

    fn harness_snapshot(remaining: i64, status: TimerStatus) -> TimerSnapshot {
        let mut state = TimerState::new(TimerMode::Work, 25 * 60);
        state.status = status;
        state.remaining_seconds = remaining;
        TimerSnapshot::from(&state)
    }

    #[test]
    fn works_without_subscribers_or_notifier() {
        let store = Arc::new(MemoryStore::new());
        let mut timer = SessionTimer::new(
            SettingsManager::new(store.clone()),
            SessionLog::new(store.clone()),
            Arc::new(ManualClock::new(Utc::now())),
            Arc::new(RecordingAlarm::default()),
        );

        timer.start();
        for _ in 0..25 * 60 + 1 {
            timer.tick();
        }
        assert_eq!(SessionLog::new(store).load().len(), 1);
    }
}
