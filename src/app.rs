//! Process-scoped context: the one place the store, lock registry,
//! engine, and reaper are wired together.
//!
//! Initialization order: store first, then engine, then reaper. Shutdown
//! is the reverse: the reaper is stopped before the store is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::{DbError, SessionStore};
use crate::engine::GameEngine;
use crate::locks::LockRegistry;
use crate::notify::Notifier;
use crate::reaper::Reaper;

/// Thresholds for the reaper, in one place so the binary and tests share
/// defaults.
#[derive(Debug, Clone, Copy)]
pub struct ReaperConfig {
    /// Idle time before an unfinished session is forfeited.
    pub inactivity: Duration,
    /// Age before a finished session's row is deleted.
    pub retention: Duration,
    /// Sweep cadence.
    pub interval: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            inactivity: crate::reaper::DEFAULT_INACTIVITY,
            retention: crate::reaper::DEFAULT_RETENTION,
            interval: crate::reaper::DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// The running application: engine plus the background reaper.
#[derive(Debug)]
pub struct App {
    engine: GameEngine,
    reaper_task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl App {
    /// Opens the store, builds the engine, and starts the reaper.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be opened.
    pub fn start(
        db_path: &str,
        notifier: Arc<dyn Notifier>,
        config: ReaperConfig,
    ) -> Result<Self, DbError> {
        let store = Arc::new(SessionStore::open(db_path)?);
        let locks = Arc::new(LockRegistry::new());
        let engine = GameEngine::new(store, locks, notifier);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let reaper = Reaper::new(engine.clone())
            .with_inactivity(config.inactivity)
            .with_retention(config.retention)
            .with_interval(config.interval);
        let reaper_task = tokio::spawn(reaper.run(shutdown_rx));

        info!(db_path, "Application started");
        Ok(Self {
            engine,
            reaper_task,
            shutdown,
        })
    }

    /// The session engine.
    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    /// Stops the reaper and waits for it before the store is dropped.
    pub async fn shutdown(self) {
        if self.shutdown.send(true).is_err() {
            warn!("Reaper already gone at shutdown");
        }
        if let Err(e) = self.reaper_task.await {
            warn!(error = %e, "Reaper task did not stop cleanly");
        }
        info!("Application stopped");
    }
}
