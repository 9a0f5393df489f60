//! The game-session state machine.
//!
//! Every transition acquires the session's lock, loads the durable state,
//! validates, mutates, persists, and only then emits events. Rejections
//! never write; a failed save discards the in-memory mutation.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::db::{SessionStore, UserStats};
use crate::error::EngineError;
use crate::game::{Mark, rules};
use crate::locks::LockRegistry;
use crate::notify::{GameEvent, Notifier};
use crate::search::{self, Difficulty};
use crate::session::{GameResult, GameSession, MessageLocus, Mode, Seat, SessionId, generate_session_id};

/// Delay before a triggered computer move re-acquires the session lock,
/// so the reply feels considered rather than instantaneous.
const DEFAULT_AI_DELAY: Duration = Duration::from_secs(1);

/// Authoritative engine over all game sessions.
///
/// Cheap to clone; clones share the store, the lock registry, and the
/// notifier.
#[derive(Debug, Clone)]
pub struct GameEngine {
    store: Arc<SessionStore>,
    locks: Arc<LockRegistry>,
    notifier: Arc<dyn Notifier>,
    ai_delay: Duration,
}

impl GameEngine {
    /// Creates an engine over the given store, lock registry, and
    /// notifier.
    pub fn new(
        store: Arc<SessionStore>,
        locks: Arc<LockRegistry>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            locks,
            notifier,
            ai_delay: DEFAULT_AI_DELAY,
        }
    }

    /// Overrides the computer-move delay. Tests set this to zero.
    pub fn with_ai_delay(mut self, delay: Duration) -> Self {
        self.ai_delay = delay;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// The lock registry.
    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    fn load_required(&self, session_id: &str) -> Result<GameSession, EngineError> {
        self.store
            .load_session(session_id)?
            .ok_or_else(|| EngineError::SessionNotFound {
                id: session_id.to_string(),
            })
    }

    /// Creates a new open-lobby session with `user` seated as X.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] if the store rejects the row.
    #[instrument(skip(self))]
    pub async fn new_session(&self, user: &str) -> Result<SessionId, EngineError> {
        let id = generate_session_id();
        let session = GameSession::new(id.clone(), user.to_string());
        self.store.create_session(&session)?;
        info!(session_id = %id, user, "Session created");
        Ok(id)
    }

    /// Fixes the session mode. Only valid in the lobby, before any move
    /// has been played; switching to ai unseats a human at O (the
    /// computer is seated by [`Self::choose_difficulty`]), and switching
    /// to pvp unseats a previously chosen computer.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModeMismatch`] once moves have been played,
    /// plus the usual missing/finished/participant failures.
    #[instrument(skip(self))]
    pub async fn choose_mode(
        &self,
        session_id: &str,
        user: &str,
        mode: Mode,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        if session.mark_of(user).is_none() {
            return Err(EngineError::NotAParticipant);
        }
        if !session.history.is_empty() {
            return Err(EngineError::ModeMismatch);
        }
        session.mode = Some(mode);
        if mode == Mode::Ai || session.is_computer_seat(Mark::O) {
            session.seat_o = None;
        }
        self.store.save_session(&session)?;
        info!(session_id, ?mode, "Mode chosen");
        Ok(())
    }

    /// Sets the computer strength and binds seat O to the computer.
    /// Requires the mode to already be ai.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModeMismatch`] if the session is not in ai
    /// mode, plus the usual missing/finished/participant failures.
    #[instrument(skip(self))]
    pub async fn choose_difficulty(
        &self,
        session_id: &str,
        user: &str,
        difficulty: Difficulty,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        if session.mark_of(user).is_none() {
            return Err(EngineError::NotAParticipant);
        }
        if session.mode != Some(Mode::Ai) {
            return Err(EngineError::ModeMismatch);
        }
        session.ai_difficulty = Some(difficulty);
        session.seat_o = Some(Seat::Computer);
        self.store.save_session(&session)?;
        info!(session_id, %difficulty, "Difficulty chosen, computer seated as O");
        self.emit_board(&session).await;
        // X is a human and moves first, but guard against a restart having
        // left the computer on turn.
        if session.is_computer_seat(session.current_player) {
            self.spawn_computer_move(session_id);
        }
        Ok(())
    }

    /// Seats `user` as O in a pvp session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ModeMismatch`] outside pvp mode,
    /// [`EngineError::SelfJoin`] if the user is already seated,
    /// [`EngineError::SeatTaken`] if O is occupied, or
    /// [`EngineError::AlreadyFinished`].
    #[instrument(skip(self))]
    pub async fn join(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        if session.mode != Some(Mode::Pvp) {
            return Err(EngineError::ModeMismatch);
        }
        if session.mark_of(user).is_some() {
            return Err(EngineError::SelfJoin);
        }
        if session.seat_o.is_some() {
            return Err(EngineError::SeatTaken);
        }
        session.seat_o = Some(Seat::User(user.to_string()));
        self.store.save_session(&session)?;
        info!(session_id, user, "Joined as O");
        self.emit_board(&session).await;
        Ok(())
    }

    /// Applies one move for `user`. Uses the non-blocking acquire: a
    /// contended session rejects immediately with [`EngineError::Busy`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Busy`], [`EngineError::AlreadyFinished`],
    /// [`EngineError::NotAParticipant`], [`EngineError::NotYourTurn`], or
    /// [`EngineError::InvalidMove`]; rejections leave board, turn, and
    /// last-activity untouched.
    #[instrument(skip(self))]
    pub async fn submit_move(
        &self,
        session_id: &str,
        user: &str,
        cell: usize,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.try_acquire(session_id)?;
        let mut session = self.load_required(session_id)?;
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        let mark = session
            .mark_of(user)
            .ok_or(EngineError::NotAParticipant)?;
        if mark != session.current_player {
            return Err(EngineError::NotYourTurn {
                expected: session.current_player,
            });
        }
        self.advance(&mut session, mark, cell).await
    }

    /// Resolves the computer's turn for a session. Spawned with a delay
    /// after a human move flips the turn onto a computer seat; runs the
    /// same `advance` path as a human, with no turn-validation bypass.
    ///
    /// Stale triggers (session gone, finished, or the turn moved on) are
    /// benign no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] if the store fails.
    #[instrument(skip(self))]
    pub async fn computer_move(&self, session_id: &str) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let Some(mut session) = self.store.load_session(session_id)? else {
            return Ok(());
        };
        if session.finished || !session.is_computer_seat(session.current_player) {
            return Ok(());
        }
        if session.board.is_full() {
            return Ok(());
        }
        let mark = session.current_player;
        let difficulty = session.ai_difficulty.unwrap_or(Difficulty::Medium);
        let cell = search::choose_move(&session.board, mark, mark.opponent(), difficulty);
        info!(session_id, %mark, cell, %difficulty, "Computer move chosen");
        self.advance(&mut session, mark, cell).await
    }

    /// Validates that `user` may forfeit. No mutation; the collaborator
    /// renders a confirmation prompt.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAParticipant`] or
    /// [`EngineError::AlreadyFinished`].
    #[instrument(skip(self))]
    pub async fn request_forfeit(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        let session = self.load_required(session_id)?;
        if session.mark_of(user).is_none() {
            return Err(EngineError::NotAParticipant);
        }
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        Ok(())
    }

    /// Forfeits the session: the other mark wins, with no line highlight.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyFinished`] on a repeat attempt (the
    /// session state and stats are untouched).
    #[instrument(skip(self))]
    pub async fn confirm_forfeit(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        let mark = session
            .mark_of(user)
            .ok_or(EngineError::NotAParticipant)?;
        if session.finished {
            return Err(EngineError::AlreadyFinished);
        }
        let winner = mark.opponent();
        info!(session_id, user, %winner, "Forfeit confirmed");
        self.finish(&mut session, GameResult::Win(winner), None)
            .await?;
        Ok(())
    }

    /// Cancels a pending confirmation: re-emits the current board, no
    /// mutation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] for a missing session.
    #[instrument(skip(self))]
    pub async fn cancel(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        self.refresh(session_id, user).await
    }

    /// Validates that `user` may restart. No mutation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAParticipant`] for outsiders.
    #[instrument(skip(self))]
    pub async fn request_restart(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        let session = self.load_required(session_id)?;
        if session.mark_of(user).is_none() {
            return Err(EngineError::NotAParticipant);
        }
        Ok(())
    }

    /// Restarts the session in place: fresh board and history, X to move,
    /// seats and mode preserved, same session id. Valid whether or not
    /// the previous game finished.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAParticipant`] for outsiders.
    #[instrument(skip(self))]
    pub async fn confirm_restart(&self, session_id: &str, user: &str) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        if session.mark_of(user).is_none() {
            return Err(EngineError::NotAParticipant);
        }
        session.restart();
        self.store.save_session(&session)?;
        info!(session_id, user, "Session restarted");
        self.emit_board(&session).await;
        if session.is_computer_seat(session.current_player) {
            self.spawn_computer_move(session_id);
        }
        Ok(())
    }

    /// Re-emits the current board state without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SessionNotFound`] for a missing session.
    #[instrument(skip(self))]
    pub async fn refresh(&self, session_id: &str, _user: &str) -> Result<(), EngineError> {
        let session = self.load_required(session_id)?;
        self.emit_board(&session).await;
        Ok(())
    }

    /// Records the delivery handle a participant's board view lives at,
    /// so later updates can be pushed to the right (chat, message).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotAParticipant`] for outsiders.
    #[instrument(skip(self))]
    pub async fn bind_delivery(
        &self,
        session_id: &str,
        user: &str,
        locus: MessageLocus,
    ) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.load_required(session_id)?;
        let mark = session
            .mark_of(user)
            .ok_or(EngineError::NotAParticipant)?;
        session.set_locus(mark, locus);
        self.store.save_session(&session)?;
        Ok(())
    }

    /// Loads (creating if absent) a user's aggregate counters.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] if the store fails.
    #[instrument(skip(self))]
    pub async fn get_stats(&self, user: &str) -> Result<UserStats, EngineError> {
        Ok(self.store.get_or_create_stats(user)?)
    }

    /// Reaper-triggered forfeit of an idle session: the player who failed
    /// to move loses. Already-finished or vanished sessions are benign
    /// no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] if the store fails.
    #[instrument(skip(self))]
    pub async fn timeout_forfeit(&self, session_id: &str) -> Result<(), EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let Some(mut session) = self.store.load_session(session_id)? else {
            return Ok(());
        };
        if session.finished {
            return Ok(());
        }
        let forced_loser = session.current_player;
        let winner = forced_loser.opponent();
        warn!(session_id, %forced_loser, "Idle session forced to forfeit");
        self.notifier
            .notify(GameEvent::SessionExpired {
                session_id: session.id.clone(),
                forced_loser,
            })
            .await;
        self.finish(&mut session, GameResult::Win(winner), None)
            .await?;
        Ok(())
    }

    /// Reaper-triggered deletion of a finished session past its retention
    /// window. Both conditions are re-checked after acquiring the session
    /// lock: an in-flight operation (a restart, say) may have revived the
    /// game between the sweep's scan and this call. Returns `true` if the
    /// row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persistence`] if the store fails.
    #[instrument(skip(self))]
    pub async fn reap_finished(
        &self,
        session_id: &str,
        now: i64,
        retention: Duration,
    ) -> Result<bool, EngineError> {
        let _guard = self.locks.acquire(session_id).await;
        let Some((session, last_activity)) = self.store.load_session_entry(session_id)? else {
            return Ok(false);
        };
        if !session.finished || now - last_activity <= retention.as_secs() as i64 {
            return Ok(false);
        }
        let removed = self.store.delete_session(session_id)?;
        self.locks.evict(session_id);
        if removed {
            info!(session_id, "Deleted stale finished session");
        }
        Ok(removed)
    }

    /// Applies a validated move and drives the resulting transition:
    /// finish on win or draw, otherwise flip the turn and trigger the
    /// computer if its seat is next. Caller holds the session lock and
    /// has verified `mark` is on turn.
    async fn advance(
        &self,
        session: &mut GameSession,
        mark: Mark,
        cell: usize,
    ) -> Result<(), EngineError> {
        session.board.apply(cell, mark)?;
        session.push_history(mark, cell);
        self.store.save_session(session)?;

        if let Some((winner_mark, line)) = rules::winner(&session.board) {
            self.finish(session, GameResult::Win(winner_mark), Some(line))
                .await?;
            return Ok(());
        }
        if rules::is_draw(&session.board) {
            self.finish(session, GameResult::Draw, None).await?;
            return Ok(());
        }

        session.current_player = mark.opponent();
        self.store.save_session(session)?;
        self.emit_board(session).await;
        if session.is_computer_seat(session.current_player) {
            self.spawn_computer_move(&session.id);
        }
        Ok(())
    }

    /// Transitions a session to finished, persists, updates both human
    /// participants' stats exactly once, and emits the outcome. Caller
    /// holds the session lock and has verified the session is unfinished.
    async fn finish(
        &self,
        session: &mut GameSession,
        result: GameResult,
        winning_line: Option<[usize; 3]>,
    ) -> Result<(), EngineError> {
        if !session.finish(result) {
            // Guarded by every caller; the absorbing state stays absorbed.
            return Ok(());
        }
        self.store.save_session(session)?;
        let winner_stats = self.record_outcome(session, result)?;
        info!(session_id = %session.id, ?result, "Game finished");
        self.notifier
            .notify(GameEvent::GameFinished {
                session_id: session.id.clone(),
                board: session.board.clone(),
                result,
                winning_line,
                winner_stats,
            })
            .await;
        Ok(())
    }

    /// Updates stats for the human participants of a finished session.
    /// Computer seats are skipped. Returns the winner's updated counters
    /// when there is a human winner.
    fn record_outcome(
        &self,
        session: &GameSession,
        result: GameResult,
    ) -> Result<Option<UserStats>, EngineError> {
        match result {
            GameResult::Draw => {
                for mark in [Mark::X, Mark::O] {
                    if let Some(Seat::User(user)) = session.seat(mark) {
                        self.store.mutate_stats(user, UserStats::apply_draw)?;
                    }
                }
                Ok(None)
            }
            GameResult::Win(winner) => {
                let mut winner_stats = None;
                if let Some(Seat::User(user)) = session.seat(winner) {
                    winner_stats = Some(self.store.mutate_stats(user, UserStats::apply_win)?);
                }
                if let Some(Seat::User(user)) = session.seat(winner.opponent()) {
                    self.store.mutate_stats(user, UserStats::apply_loss)?;
                }
                Ok(winner_stats)
            }
        }
    }

    async fn emit_board(&self, session: &GameSession) {
        self.notifier
            .notify(GameEvent::BoardUpdated {
                session_id: session.id.clone(),
                board: session.board.clone(),
                current_player: session.current_player,
                move_count: session.history.len(),
            })
            .await;
    }

    /// Spawns the delayed computer reply as a supervised task: bounded
    /// lifetime (one move), errors logged rather than dropped, and the
    /// session lock is only taken inside `computer_move`.
    fn spawn_computer_move(&self, session_id: &str) {
        let engine = self.clone();
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(engine.ai_delay).await;
            if let Err(e) = engine.computer_move(&session_id).await {
                warn!(session_id, error = %e, "Computer move failed");
            }
        });
    }
}
