//! Outbound events for the messaging collaborator.
//!
//! The engine describes outcomes; the transport renders them. Notifier
//! failures are the collaborator's problem and never roll back a
//! committed transition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::UserStats;
use crate::game::{Board, Mark};
use crate::session::{GameResult, SessionId};

/// Event emitted after a committed session transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// The board changed and the game continues.
    BoardUpdated {
        /// Session the board belongs to.
        session_id: SessionId,
        /// Board after the transition.
        board: Board,
        /// Whose turn is next.
        current_player: Mark,
        /// Accepted moves so far.
        move_count: usize,
    },
    /// The session reached a terminal state.
    GameFinished {
        /// Session that finished.
        session_id: SessionId,
        /// Final board.
        board: Board,
        /// Win or draw.
        result: GameResult,
        /// Cells of the winning line, if the win came from a completed
        /// line rather than a forfeit.
        winning_line: Option<[usize; 3]>,
        /// The winner's counters after the update, for streak display.
        winner_stats: Option<UserStats>,
    },
    /// The reaper forced a forfeit on an idle session.
    SessionExpired {
        /// Session that expired.
        session_id: SessionId,
        /// The mark declared the loser (the non-moving player).
        forced_loser: Mark,
    },
}

/// Collaborator interface the engine pushes events through.
#[async_trait]
pub trait Notifier: std::fmt::Debug + Send + Sync {
    /// Delivers one event. Implementations must not block the engine for
    /// long; delivery failures are theirs to log and absorb.
    async fn notify(&self, event: GameEvent);
}

/// Notifier that logs events, used by the standalone binary and tests.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: GameEvent) {
        match &event {
            GameEvent::BoardUpdated {
                session_id,
                board,
                current_player,
                move_count,
            } => info!(
                %session_id,
                %current_player,
                move_count = *move_count,
                board = %board.render(),
                "board updated"
            ),
            GameEvent::GameFinished {
                session_id,
                result,
                winning_line,
                ..
            } => info!(%session_id, ?result, ?winning_line, "game finished"),
            GameEvent::SessionExpired {
                session_id,
                forced_loser,
            } => info!(%session_id, %forced_loser, "session expired"),
        }
    }
}
