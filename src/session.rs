//! Game session aggregate: the persisted state of one match.

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game::{Board, Mark};
use crate::search::Difficulty;

/// Unique identifier for a game session.
pub type SessionId = String;

/// Opaque identifier for a remote participant.
pub type UserId = String;

/// Who holds a seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    /// A remote user.
    User(UserId),
    /// The computer opponent sentinel.
    Computer,
}

impl Seat {
    /// True if this seat is held by the given user.
    pub fn is_user(&self, user: &str) -> bool {
        matches!(self, Seat::User(id) if id == user)
    }
}

/// How the session is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Two remote users.
    Pvp,
    /// One remote user against the computer.
    Ai,
}

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameResult {
    /// The given mark completed a line or won by forfeit.
    Win(Mark),
    /// Full board, no line.
    Draw,
}

/// One accepted move, kept for move-count display and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Mark that moved.
    pub mark: Mark,
    /// Cell index played.
    pub cell: usize,
    /// Unix timestamp of acceptance.
    pub at: i64,
}

/// Last known (chat, message) delivery handle for one seat. In pvp mode
/// each participant views the board through a different locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageLocus {
    /// Chat the board message lives in.
    pub chat_id: i64,
    /// Message to edit in place.
    pub message_id: i64,
}

/// Authoritative state of one game session.
///
/// The store owns the durable copy; the engine holds this in memory only
/// for the duration of one locked operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    /// Opaque session id, 12 lowercase hex chars.
    pub id: SessionId,
    /// The board.
    pub board: Board,
    /// Whose turn is next.
    pub current_player: Mark,
    /// Pvp or Ai; `None` while the lobby is open.
    pub mode: Option<Mode>,
    /// Seat X, or `None` if open.
    pub seat_x: Option<Seat>,
    /// Seat O, or `None` if open.
    pub seat_o: Option<Seat>,
    /// Computer strength; meaningful only when `mode` is `Ai`.
    pub ai_difficulty: Option<Difficulty>,
    /// Append-only move history.
    pub history: Vec<MoveRecord>,
    /// Whether the session reached a terminal state.
    pub finished: bool,
    /// Terminal result, set exactly once.
    pub result: Option<GameResult>,
    /// Delivery handle for seat X's board view.
    pub locus_x: Option<MessageLocus>,
    /// Delivery handle for seat O's board view.
    pub locus_o: Option<MessageLocus>,
}

/// Generates a fresh 12-hex-char session id. Collision tolerance is low
/// for the in-flight game set, so this entropy is sufficient.
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| {
            let digit: u8 = rng.gen_range(0..16);
            char::from_digit(u32::from(digit), 16).expect("in range for base 16")
        })
        .collect()
}

impl GameSession {
    /// Creates an open-lobby session with the creator seated as X.
    pub fn new(id: SessionId, creator: UserId) -> Self {
        Self {
            id,
            board: Board::new(),
            current_player: Mark::X,
            mode: None,
            seat_x: Some(Seat::User(creator)),
            seat_o: None,
            ai_difficulty: None,
            history: Vec::new(),
            finished: false,
            result: None,
            locus_x: None,
            locus_o: None,
        }
    }

    /// Returns the seat holder for a mark.
    pub fn seat(&self, mark: Mark) -> Option<&Seat> {
        match mark {
            Mark::X => self.seat_x.as_ref(),
            Mark::O => self.seat_o.as_ref(),
        }
    }

    /// Resolves a user id to the mark they hold, if any.
    pub fn mark_of(&self, user: &str) -> Option<Mark> {
        if self.seat_x.as_ref().is_some_and(|s| s.is_user(user)) {
            Some(Mark::X)
        } else if self.seat_o.as_ref().is_some_and(|s| s.is_user(user)) {
            Some(Mark::O)
        } else {
            None
        }
    }

    /// True if the mark's seat is held by the computer sentinel.
    pub fn is_computer_seat(&self, mark: Mark) -> bool {
        self.seat(mark) == Some(&Seat::Computer)
    }

    /// Records an accepted move in the history.
    pub fn push_history(&mut self, mark: Mark, cell: usize) {
        self.history.push(MoveRecord {
            mark,
            cell,
            at: Utc::now().timestamp(),
        });
    }

    /// Marks the session finished with the given result. Returns `false`
    /// if it was already finished: a second finish must be a no-op.
    pub fn finish(&mut self, result: GameResult) -> bool {
        if self.finished {
            return false;
        }
        self.finished = true;
        self.result = Some(result);
        true
    }

    /// Clears board, history, and result for a rematch; seats and mode are
    /// kept, X moves first again. The session id does not change.
    pub fn restart(&mut self) {
        self.board = Board::new();
        self.current_player = Mark::X;
        self.history = Vec::new();
        self.finished = false;
        self.result = None;
    }

    /// Delivery handle for a seat, if one was recorded.
    pub fn locus(&self, mark: Mark) -> Option<MessageLocus> {
        match mark {
            Mark::X => self.locus_x,
            Mark::O => self.locus_o,
        }
    }

    /// Records the delivery handle for a seat.
    pub fn set_locus(&mut self, mark: Mark, locus: MessageLocus) {
        match mark {
            Mark::X => self.locus_x = Some(locus),
            Mark::O => self.locus_o = Some(locus),
        }
    }
}
