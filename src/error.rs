//! Engine error taxonomy.
//!
//! Every validation failure is a typed variant returned to the caller;
//! nothing escapes the session-lock boundary as a panic.

use derive_more::{Display, Error};

use crate::db::DbError;
use crate::game::Mark;

/// Failure conditions the session engine can report.
#[derive(Debug, Display, Error)]
pub enum EngineError {
    /// Cell index out of range or already occupied.
    #[display("invalid move: cell {} is out of range or occupied", cell)]
    InvalidMove {
        /// The rejected cell index.
        cell: usize,
    },

    /// The submitting seat's mark is not the current player.
    #[display("not your turn: waiting for {}", expected)]
    NotYourTurn {
        /// The mark whose turn it is.
        expected: Mark,
    },

    /// The user holds no seat in this session.
    #[display("user is not a participant in this session")]
    NotAParticipant,

    /// The session already reached a terminal state.
    #[display("game is already finished")]
    AlreadyFinished,

    /// Join attempt against an occupied seat.
    #[display("seat is already taken")]
    SeatTaken,

    /// Operation requires a different session mode.
    #[display("operation does not match the session mode")]
    ModeMismatch,

    /// The creator tried to join their own session as the opponent.
    #[display("cannot join your own session")]
    SelfJoin,

    /// Unknown or expired session id.
    #[display("session '{}' not found or expired", id)]
    SessionNotFound {
        /// The missing session id.
        id: String,
    },

    /// Another mutation for this session is mid-flight. Terminal for the
    /// request; the caller decides whether to resubmit.
    #[display("session is busy processing another request")]
    Busy,

    /// The store failed; any in-memory mutation was discarded.
    #[display("persistence failure: {}", _0)]
    Persistence(DbError),
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        Self::Persistence(err)
    }
}
