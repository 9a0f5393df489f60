//! Session and statistics store over SQLite.
//!
//! One connection guarded by a mutex: every save is visible to the next
//! load in this process, which the engine's lock discipline relies on.
//! Cross-process consistency is not a goal.

use std::sync::Mutex;

use chrono::Utc;
use diesel::prelude::*;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tracing::{debug, info, instrument, warn};

use crate::db::{DbError, SessionRow, UserStats, schema};
use crate::session::GameSession;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Durable store for sessions and per-user statistics.
pub struct SessionStore {
    conn: Mutex<SqliteConnection>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Opens (creating if needed) the database at `db_path` and applies
    /// pending migrations. Use `":memory:"` for tests.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or a migration fails.
    #[instrument]
    pub fn open(db_path: &str) -> Result<Self, DbError> {
        info!(path = %db_path, "Opening session store");
        let mut conn = SqliteConnection::establish(db_path)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| DbError::new(format!("Migration error: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| DbError::new("store connection poisoned"))?;
        f(&mut conn)
    }

    /// Inserts a freshly created session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the id already exists or the insert fails.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn create_session(&self, session: &GameSession) -> Result<(), DbError> {
        let row = SessionRow::new(
            session.id.clone(),
            serde_json::to_string(session)?,
            Utc::now().timestamp(),
        );
        self.with_conn(|conn| {
            diesel::insert_into(schema::sessions::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })?;
        debug!("Session created");
        Ok(())
    }

    /// Saves a session, overwriting any previous state (last write wins)
    /// and refreshing its last-activity timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if serialization or the write fails.
    #[instrument(skip(self, session), fields(session_id = %session.id))]
    pub fn save_session(&self, session: &GameSession) -> Result<(), DbError> {
        let row = SessionRow::new(
            session.id.clone(),
            serde_json::to_string(session)?,
            Utc::now().timestamp(),
        );
        self.with_conn(|conn| {
            diesel::replace_into(schema::sessions::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })?;
        debug!("Session saved");
        Ok(())
    }

    /// Loads a session by id, or `None` if absent.
    ///
    /// The stored JSON is validated here: a row that fails to deserialize
    /// is an error, not a half-trusted session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure or corrupt state.
    #[instrument(skip(self))]
    pub fn load_session(&self, session_id: &str) -> Result<Option<GameSession>, DbError> {
        Ok(self.load_session_entry(session_id)?.map(|(session, _)| session))
    }

    /// Loads a session together with its last-activity timestamp, so a
    /// caller holding the session lock can re-check age without a second
    /// query.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure or corrupt state.
    #[instrument(skip(self))]
    pub fn load_session_entry(
        &self,
        session_id: &str,
    ) -> Result<Option<(GameSession, i64)>, DbError> {
        let row: Option<SessionRow> = self.with_conn(|conn| {
            Ok(schema::sessions::table
                .find(session_id)
                .first::<SessionRow>(conn)
                .optional()?)
        })?;
        match row {
            Some(row) => Ok(Some((serde_json::from_str(row.state())?, *row.last_activity()))),
            None => {
                debug!(session_id, "Session not found");
                Ok(None)
            }
        }
    }

    /// Deletes a session row. Returns `true` if a row was removed; a
    /// missing row is a benign no-op for racing callers.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self))]
    pub fn delete_session(&self, session_id: &str) -> Result<bool, DbError> {
        let removed = self.with_conn(|conn| {
            Ok(diesel::delete(schema::sessions::table.find(session_id)).execute(conn)?)
        })?;
        debug!(session_id, removed, "Session delete");
        Ok(removed > 0)
    }

    /// Updates only the last-activity timestamp of a session.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self))]
    pub fn touch(&self, session_id: &str) -> Result<(), DbError> {
        let now = Utc::now().timestamp();
        self.with_conn(|conn| {
            diesel::update(schema::sessions::table.find(session_id))
                .set(schema::sessions::last_activity.eq(now))
                .execute(conn)?;
            Ok(())
        })
    }

    /// Returns every stored session with its last-activity timestamp.
    /// Used only by the reaper's sweep; rows with corrupt state are
    /// logged and skipped so one bad row cannot stall the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self))]
    pub fn scan_all(&self) -> Result<Vec<(GameSession, i64)>, DbError> {
        let rows: Vec<SessionRow> =
            self.with_conn(|conn| Ok(schema::sessions::table.load::<SessionRow>(conn)?))?;
        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_str::<GameSession>(row.state()) {
                Ok(session) => sessions.push((session, *row.last_activity())),
                Err(e) => {
                    warn!(session_id = %row.session_id(), error = %e, "Skipping corrupt session row")
                }
            }
        }
        debug!(count = sessions.len(), "Scanned sessions");
        Ok(sessions)
    }

    /// Loads a user's counters, inserting a zeroed row on first sight.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self))]
    pub fn get_or_create_stats(&self, user_id: &str) -> Result<UserStats, DbError> {
        self.with_conn(|conn| {
            let existing = schema::stats::table
                .find(user_id)
                .first::<UserStats>(conn)
                .optional()?;
            if let Some(stats) = existing {
                return Ok(stats);
            }
            let fresh = UserStats::zeroed(user_id.to_string());
            diesel::insert_into(schema::stats::table)
                .values(&fresh)
                .execute(conn)?;
            debug!(user_id, "Created stats row");
            Ok(fresh)
        })
    }

    /// Writes back a full stats row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self, stats), fields(user_id = %stats.user_id()))]
    pub fn update_stats(&self, stats: &UserStats) -> Result<(), DbError> {
        self.with_conn(|conn| {
            diesel::update(schema::stats::table.find(stats.user_id()))
                .set(stats)
                .execute(conn)?;
            Ok(())
        })
    }

    /// Read-modify-write of one user's counters. Must be called while the
    /// finishing session's lock is held so two finishes cannot interleave.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] on query failure.
    #[instrument(skip(self, apply))]
    pub fn mutate_stats(
        &self,
        user_id: &str,
        apply: impl FnOnce(&mut UserStats),
    ) -> Result<UserStats, DbError> {
        let mut stats = self.get_or_create_stats(user_id)?;
        apply(&mut stats);
        self.update_stats(&stats)?;
        Ok(stats)
    }
}
