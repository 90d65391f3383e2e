use std::{sync::Arc, time::Duration};

use log::debug;
use tokio::{
    sync::{broadcast, Mutex},
    task::{self, JoinHandle},
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SettingsError, log_error, log_info, settings::TimerConfig,
    utils::logging::debug_enabled,
};

use super::{SessionTimer, TickOutcome, TimerEvent, TimerMode, TimerSnapshot, TimerState};

const ENABLE_LOGS: bool = true;

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Drives a [`SessionTimer`] from the tokio clock. All calls go through one
/// mutex and at most one ticker task exists at a time.
#[derive(Clone)]
pub struct TimerController {
    timer: Arc<Mutex<SessionTimer>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    // Parent of every ticker token; cancelled once by `close`.
    closed: CancellationToken,
    tick_interval: Duration,
    log_ticks: bool,
}

impl TimerController {
    pub fn new(timer: SessionTimer) -> Self {
        Self {
            timer: Arc::new(Mutex::new(timer)),
            ticker: Arc::new(Mutex::new(None)),
            closed: CancellationToken::new(),
            tick_interval: Duration::from_secs(1),
            log_ticks: debug_enabled(),
        }
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub async fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.timer.lock().await.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.timer.lock().await.snapshot()
    }

    pub async fn state(&self) -> TimerState {
        self.timer.lock().await.state().clone()
    }

    pub async fn config(&self) -> TimerConfig {
        self.timer.lock().await.config().clone()
    }

    pub async fn start(&self) -> TimerSnapshot {
        let mut timer = self.timer.lock().await;
        timer.start();
        self.sync_ticker(&timer).await;
        timer.snapshot()
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let mut timer = self.timer.lock().await;
        timer.pause();
        self.sync_ticker(&timer).await;
        timer.snapshot()
    }

    pub async fn toggle(&self) -> TimerSnapshot {
        let mut timer = self.timer.lock().await;
        timer.toggle();
        self.sync_ticker(&timer).await;
        timer.snapshot()
    }

    pub async fn reset(&self) -> TimerSnapshot {
        let mut timer = self.timer.lock().await;
        timer.reset();
        self.sync_ticker(&timer).await;
        timer.snapshot()
    }

    pub async fn switch_mode(&self, target: TimerMode) -> TimerSnapshot {
        let mut timer = self.timer.lock().await;
        timer.switch_mode(target);
        // A mode switch restarts the countdown, so the tick phase restarts too.
        self.cancel_ticker().await;
        self.sync_ticker(&timer).await;
        timer.snapshot()
    }

    pub async fn update_settings(
        &self,
        config: TimerConfig,
    ) -> Result<TimerSnapshot, SettingsError> {
        let mut timer = self.timer.lock().await;
        timer.update_settings(config)?;
        Ok(timer.snapshot())
    }

    /// Stops ticking without changing the timer state.
    pub async fn shutdown(&self) {
        let _timer = self.timer.lock().await;
        self.cancel_ticker().await;
    }

    /// Stops the ticker for good, from any context. The timer state stays
    /// readable but no clone of this controller will tick again.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    // Called with the timer lock held, so a ticker cancelled here can never
    // tick again: it checks its token under the same lock.
    async fn sync_ticker(&self, timer: &SessionTimer) {
        let mut ticker_guard = self.ticker.lock().await;
        let alive = ticker_guard
            .as_ref()
            .is_some_and(|ticker| !ticker.handle.is_finished() && !ticker.cancel.is_cancelled());

        if timer.is_running() {
            if !alive {
                *ticker_guard = Some(self.spawn_ticker());
            }
        } else if let Some(ticker) = ticker_guard.take() {
            ticker.cancel.cancel();
        }
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel.cancel();
        }
    }

    fn spawn_ticker(&self) -> Ticker {
        let timer = self.timer.clone();
        let cancel = self.closed.child_token();
        let token = cancel.clone();
        let period = self.tick_interval;
        let log_ticks = self.log_ticks;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                // A completing tick writes the session log through the
                // synchronous store, so it runs on the blocking pool.
                let timer = timer.clone();
                let token = token.clone();
                let keep_ticking = task::spawn_blocking(move || {
                    tick_once(&mut timer.blocking_lock(), &token, log_ticks)
                })
                .await;

                match keep_ticking {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => {
                        log_error!("Ticker task failed: {err}");
                        break;
                    }
                }
            }
        });

        Ticker { handle, cancel }
    }
}

// Runs with the timer lock held, so a token cancelled by `sync_ticker` is
// always seen before the tick. Returns whether the ticker should go on.
fn tick_once(timer: &mut SessionTimer, token: &CancellationToken, log_ticks: bool) -> bool {
    if token.is_cancelled() {
        return false;
    }

    if timer.is_running() {
        let outcome = timer.tick();
        if log_ticks {
            debug!("tick: {:?} ({})", outcome, timer.state().display());
        }
        if let TickOutcome::Completed(finished) = outcome {
            log_info!("{} interval completed by ticker", finished.label());
        }
    }

    if !timer.is_running() {
        // Retire under the lock so the next start spawns a fresh ticker.
        token.cancel();
        return false;
    }
    true
}
