//! Gridmatch - concurrent tic-tac-toe session engine.
//!
//! The authoritative state machine for many simultaneous two-player
//! games, one of which may be the computer. The messaging transport that
//! carries user intents and renders boards is an external collaborator
//! behind the [`Notifier`] trait.
//!
//! # Architecture
//!
//! - **Board model** ([`Board`], [`rules`]): pure rules, no I/O.
//! - **Search** ([`choose_move`]): random / bounded / full alpha-beta minimax.
//! - **Store** ([`SessionStore`]): SQLite persistence for sessions and stats.
//! - **Locks** ([`LockRegistry`]): one mutex per session id, created on demand.
//! - **Engine** ([`GameEngine`]): the session state machine.
//! - **Reaper** ([`Reaper`]): idle-forfeit and stale-row cleanup.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gridmatch::{App, Mode, ReaperConfig, TracingNotifier};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let app = App::start("games.db", Arc::new(TracingNotifier), ReaperConfig::default())?;
//! let engine = app.engine();
//!
//! let id = engine.new_session("alice").await?;
//! engine.choose_mode(&id, "alice", Mode::Pvp).await?;
//! engine.join(&id, "bob").await?;
//! engine.submit_move(&id, "alice", 4).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod app;
mod db;
mod engine;
mod error;
mod game;
mod locks;
mod notify;
mod reaper;
mod search;
mod session;

// Crate-level exports - application context
pub use app::{App, ReaperConfig};

// Crate-level exports - persistence
pub use db::{DbError, SessionStore, UserStats};

// Crate-level exports - engine and errors
pub use engine::GameEngine;
pub use error::EngineError;

// Crate-level exports - board model and search
pub use game::{Board, Cell, Mark, rules};
pub use search::{Difficulty, choose_move};

// Crate-level exports - locking and reaping
pub use locks::{LockRegistry, SessionGuard};
pub use reaper::Reaper;

// Crate-level exports - notifications
pub use notify::{GameEvent, Notifier, TracingNotifier};

// Crate-level exports - session types
pub use session::{
    GameResult, GameSession, MessageLocus, Mode, MoveRecord, Seat, SessionId, UserId,
    generate_session_id,
};
