//! Background sweep of idle and stale sessions.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::engine::GameEngine;

/// Default sweep cadence.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
/// Idle time after which an unfinished session is forced to forfeit.
pub const DEFAULT_INACTIVITY: Duration = Duration::from_secs(5 * 60);
/// Age after which a finished session's row is deleted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 3600);

/// Periodic reaper over the session store.
///
/// Runs independently of request traffic; per-session failures are logged
/// and never abort the rest of a sweep.
#[derive(Debug, Clone)]
pub struct Reaper {
    engine: GameEngine,
    inactivity: Duration,
    retention: Duration,
    interval: Duration,
}

impl Reaper {
    /// Creates a reaper with the default thresholds.
    pub fn new(engine: GameEngine) -> Self {
        Self {
            engine,
            inactivity: DEFAULT_INACTIVITY,
            retention: DEFAULT_RETENTION,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Overrides the idle-forfeit threshold.
    pub fn with_inactivity(mut self, inactivity: Duration) -> Self {
        self.inactivity = inactivity;
        self
    }

    /// Overrides the finished-session retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Overrides the sweep cadence.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs sweeps on the configured interval until `shutdown` flips to
    /// `true`. Spawn this on the runtime; it holds no lock between
    /// sweeps.
    #[instrument(skip(self, shutdown))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            inactivity_secs = self.inactivity.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Reaper started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once(Utc::now().timestamp()).await;
                }
                changed = shutdown.changed() => {
                    // A dropped sender also means the app is going away.
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reaper stopped");
                        return;
                    }
                }
            }
        }
    }

    /// One full sweep at the given wall-clock second.
    ///
    /// Unfinished sessions idle past the inactivity threshold get a
    /// timeout forfeit; finished sessions older than the retention window
    /// are deleted and their lock entry evicted. Sessions that vanish
    /// mid-scan (deleted by a racing path) are benign no-ops.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self, now: i64) {
        let rows = match self.engine.store().scan_all() {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Sweep could not scan the store");
                return;
            }
        };
        debug!(count = rows.len(), "Sweeping sessions");

        for (session, last_activity) in rows {
            let age = now - last_activity;
            if session.finished {
                if age > self.retention.as_secs() as i64 {
                    // The engine re-checks both conditions under the
                    // session lock; a restart racing the sweep keeps its
                    // game.
                    if let Err(e) = self
                        .engine
                        .reap_finished(&session.id, now, self.retention)
                        .await
                    {
                        warn!(session_id = %session.id, error = %e, "Stale delete failed");
                    }
                }
                continue;
            }

            if age > self.inactivity.as_secs() as i64 {
                info!(session_id = %session.id, idle_secs = age, "Forcing idle session to forfeit");
                if let Err(e) = self.engine.timeout_forfeit(&session.id).await {
                    // Another path may have finished or deleted it already.
                    warn!(session_id = %session.id, error = %e, "Timeout forfeit failed");
                }
            }
        }
    }
}
