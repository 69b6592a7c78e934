//! Daily background jobs.
//!
//! A 60 second tick checks two UTC wall-clock jobs: capturing market closes
//! and running the signal pipeline. Each runs at most once per UTC date,
//! across restarts, via the `scheduler_runs` table.

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{AppError, Result};
use crate::services::{pipeline, SqliteStore};
use crate::types::{LiveQuote, MarketClose};
use crate::AppState;

const TICK: Duration = Duration::from_secs(60);

const CAPTURE_JOB: &str = "capture";
const SIGNALS_JOB: &str = "signals";

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Whether a job scheduled at `hour:minute` UTC should run now.
pub fn is_due(now: DateTime<Utc>, hour: u32, minute: u32, last_run: Option<NaiveDate>) -> bool {
    let today = now.date_naive();
    last_run != Some(today) && (now.hour(), now.minute()) >= (hour, minute)
}

/// Last run date per job.
#[derive(Debug, Default, Clone)]
pub struct JobTracker {
    pub last_capture: Option<NaiveDate>,
    pub last_signals: Option<NaiveDate>,
}

/// Jobs to run on this tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DueJobs {
    pub capture: bool,
    pub signals: bool,
}

impl JobTracker {
    /// Decide which jobs are due and mark them as run for today.
    pub fn due(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) -> DueJobs {
        let today = now.date_naive();
        if !is_weekday(today) {
            return DueJobs::default();
        }

        let capture = is_due(now, config.capture_hour, config.capture_minute, self.last_capture);
        let signals = is_due(now, config.signal_hour, config.signal_minute, self.last_signals);

        if capture {
            self.last_capture = Some(today);
        }
        if signals {
            self.last_signals = Some(today);
        }
        DueJobs { capture, signals }
    }
}

/// Jobs due now that have not already run today in this or an earlier
/// process. Claims each returned job in the store.
pub fn claim_due_jobs(
    store: &SqliteStore,
    tracker: &mut JobTracker,
    config: &SchedulerConfig,
    now: DateTime<Utc>,
) -> DueJobs {
    let due = tracker.due(config, now);
    let date = now.format("%Y-%m-%d").to_string();
    let started_at = now.timestamp_millis();

    let claim = |job: &str| match store.claim_job_run(job, &date, started_at) {
        Ok(true) => true,
        Ok(false) => {
            debug!("Job {} already ran for {}", job, date);
            false
        }
        Err(e) => {
            error!("Could not record {} run for {}: {}", job, date, e);
            false
        }
    };

    DueJobs {
        capture: due.capture && claim(CAPTURE_JOB),
        signals: due.signals && claim(SIGNALS_JOB),
    }
}

/// Store fresh quotes as the closes for `now`'s date. Stale cached quotes
/// are skipped. Returns rows written.
pub fn store_market_closes(store: &SqliteStore, quotes: &[LiveQuote], now: DateTime<Utc>) -> Result<usize> {
    let date = now.format("%Y-%m-%d").to_string();
    let captured_at = now.timestamp_millis();

    let mut written = 0;
    for live in quotes {
        if live.stale {
            warn!("Skipping stale {} quote for {} close", live.instrument.as_str(), date);
            continue;
        }
        store.save_market_close(&MarketClose {
            date: date.clone(),
            instrument: live.instrument.as_str().to_string(),
            price: live.quote.price,
            previous_close: live.quote.previous_close,
            change: live.quote.change,
            change_percent: live.quote.change_percent,
            captured_at,
        })?;
        written += 1;
    }

    if written == 0 {
        return Err(AppError::ExternalApi("No fresh market quotes available".to_string()));
    }
    info!("Captured {} market close(s) for {}", written, date);
    Ok(written)
}

/// Fetch and store today's close for each tracked instrument.
pub async fn capture_market_close(state: &AppState, now: DateTime<Utc>) -> Result<usize> {
    let quotes = state.market.live_quotes().await;
    store_market_closes(&state.store, &quotes, now)
}

async fn tick(state: &AppState, tracker: &mut JobTracker, now: DateTime<Utc>) {
    let due = claim_due_jobs(&state.store, tracker, &state.config.scheduler, now);

    if due.capture {
        let date = now.format("%Y-%m-%d").to_string();
        match state.store.has_market_close(&date) {
            Ok(true) => debug!("Market close for {} already captured", date),
            _ => {
                if let Err(e) = capture_market_close(state, now).await {
                    error!("Market close capture failed: {}", e);
                }
            }
        }

        match state.auth.purge_expired_sessions() {
            Ok(n) if n > 0 => info!("Purged {} expired session(s)", n),
            Ok(_) => {}
            Err(e) => warn!("Session purge failed: {}", e),
        }
    }

    if due.signals {
        let report = pipeline::generate_signals(state, &state.config.trading_symbols).await;
        if !report.failed.is_empty() {
            warn!("Scheduled run failed for: {}", report.failed.join(", "));
        }
    }
}

/// Start the scheduler loop when enabled.
pub fn spawn(state: AppState) -> Option<JoinHandle<()>> {
    let config = &state.config.scheduler;
    if !config.enabled {
        info!("Scheduler disabled");
        return None;
    }

    info!(
        "Scheduler enabled: capture at {:02}:{:02} UTC, signals at {:02}:{:02} UTC",
        config.capture_hour, config.capture_minute, config.signal_hour, config.signal_minute
    );

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        let mut tracker = JobTracker::default();
        loop {
            interval.tick().await;
            tick(&state, &mut tracker, Utc::now()).await;
        }
    }))
}
