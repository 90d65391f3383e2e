pub mod audio;
pub mod error;
pub mod models;
pub mod notify;
pub mod settings;
pub mod stats;
pub mod store;
pub mod tasks;
pub mod timer;
pub mod utils;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::NaiveDate;

pub use audio::{AlarmPlayer, RodioAlarmPlayer};
pub use error::{SettingsError, TaskError};
pub use models::{SessionRecord, Task, TaskFilter};
pub use notify::{LogNotifier, NotificationSink, Severity};
pub use settings::{SettingsManager, TimerConfig};
pub use stats::{DailyStat, DaySummary, LifetimeTotals, StatsAggregator};
pub use store::{KeyValueStore, MemoryStore, SessionLog, SqliteStore};
pub use tasks::TaskList;
pub use timer::{SessionTimer, TimerController, TimerEvent, TimerMode, TimerSnapshot};
pub use utils::{logging::init_logging, Clock, ManualClock, SystemClock};

const DB_FILE_NAME: &str = "focusdesk.sqlite3";
const SOUNDS_DIR_NAME: &str = "sounds";
const APP_DIR_NAME: &str = "focusdesk";

/// Everything a host needs, wired against one data directory.
pub struct FocusApp {
    data_dir: PathBuf,
    store: Arc<dyn KeyValueStore>,
    settings: SettingsManager,
    session_log: SessionLog,
    clock: Arc<dyn Clock>,
    alarm: Arc<dyn AlarmPlayer>,
    timer: TimerController,
}

impl FocusApp {
    /// Opens (or creates) the store under `data_dir`. Custom alarm files are
    /// looked up in `data_dir/sounds`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let store: Arc<dyn KeyValueStore> =
            Arc::new(SqliteStore::open(data_dir.join(DB_FILE_NAME))?);
        let alarm = Arc::new(RodioAlarmPlayer::new(Some(data_dir.join(SOUNDS_DIR_NAME))));

        let app = Self::with_parts(data_dir, store, Arc::new(SystemClock), alarm);
        log::info!("FocusDesk ready at {}", app.data_dir.display());
        Ok(app)
    }

    /// [`open`](Self::open) in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir().context("no platform data directory available")?;
        Self::open(base.join(APP_DIR_NAME))
    }

    /// Wires the components over caller-supplied collaborators.
    pub fn with_parts(
        data_dir: PathBuf,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        alarm: Arc<dyn AlarmPlayer>,
    ) -> Self {
        let settings = SettingsManager::new(store.clone());
        let session_log = SessionLog::new(store.clone());
        let timer = SessionTimer::new(
            settings.clone(),
            session_log.clone(),
            clock.clone(),
            alarm.clone(),
        )
        .with_notifier(Arc::new(LogNotifier));

        Self {
            data_dir,
            store,
            settings,
            session_log,
            clock,
            alarm,
            timer: TimerController::new(timer),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    /// Settings as currently stored.
    pub fn config(&self) -> TimerConfig {
        self.settings.load()
    }

    /// Saves `config` through the timer, so a stopped countdown picks up a new
    /// duration for its mode right away.
    pub async fn save_settings(
        &self,
        config: TimerConfig,
    ) -> Result<TimerSnapshot, SettingsError> {
        self.timer.update_settings(config).await
    }

    pub fn session_log(&self) -> &SessionLog {
        &self.session_log
    }

    /// Task list over the shared store. Lists obtained from separate calls
    /// see each other's changes on their next mutation.
    pub fn tasks(&self) -> TaskList {
        TaskList::load(self.store.clone())
    }

    pub fn lifetime_totals(&self) -> LifetimeTotals {
        StatsAggregator::local().lifetime_totals(&self.session_log.load())
    }

    /// Minutes per local day for the last `window_days` days, today last.
    pub fn daily_stats(&self, window_days: u32) -> Vec<DailyStat> {
        StatsAggregator::local().daily_buckets_until_today(
            &self.session_log.load(),
            window_days,
            self.clock.as_ref(),
        )
    }

    pub fn day_summary(&self, date: NaiveDate) -> DaySummary {
        StatsAggregator::local().day_summary(&self.session_log.load(), date)
    }

    pub fn today_summary(&self) -> DaySummary {
        self.day_summary(self.clock.today())
    }
}

impl Drop for FocusApp {
    fn drop(&mut self) {
        self.timer.close();
        self.alarm.stop();
    }
}
