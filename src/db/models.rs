//! Database models.

use derive_getters::Getters;
use derive_new::new;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::schema;

/// Raw session row: serialized state plus the last-activity timestamp the
/// reaper sweeps on. The JSON `state` column is validated into a
/// [`crate::session::GameSession`] at the store boundary.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, Getters, new)]
#[diesel(table_name = schema::sessions)]
pub struct SessionRow {
    session_id: String,
    state: String,
    last_activity: i64,
}

/// Aggregate win/loss/draw counters for one user.
///
/// `wins`, `losses`, and `draws` only ever grow; `win_streak` resets to
/// zero on any non-win and `best_streak` is the high-water mark.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Queryable,
    Selectable,
    Insertable,
    AsChangeset,
    Getters,
    new,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = schema::stats)]
pub struct UserStats {
    user_id: String,
    wins: i32,
    losses: i32,
    draws: i32,
    win_streak: i32,
    best_streak: i32,
}

impl UserStats {
    /// Fresh zeroed counters for a user seen for the first time.
    pub fn zeroed(user_id: String) -> Self {
        Self::new(user_id, 0, 0, 0, 0, 0)
    }

    /// Applies a win: wins and streak grow, best streak tracks the max.
    pub fn apply_win(&mut self) {
        self.wins += 1;
        self.win_streak += 1;
        if self.win_streak > self.best_streak {
            self.best_streak = self.win_streak;
        }
    }

    /// Applies a loss: losses grow, the streak resets.
    pub fn apply_loss(&mut self) {
        self.losses += 1;
        self.win_streak = 0;
    }

    /// Applies a draw: draws grow, the streak resets.
    pub fn apply_draw(&mut self) {
        self.draws += 1;
        self.win_streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_win_updates_streak_and_best() {
        let mut stats = UserStats::zeroed("alice".into());
        stats.apply_win();
        stats.apply_win();
        assert_eq!(*stats.wins(), 2);
        assert_eq!(*stats.win_streak(), 2);
        assert_eq!(*stats.best_streak(), 2);
    }

    #[test]
    fn test_loss_resets_streak_keeps_best() {
        let mut stats = UserStats::zeroed("alice".into());
        stats.apply_win();
        stats.apply_win();
        stats.apply_loss();
        assert_eq!(*stats.losses(), 1);
        assert_eq!(*stats.win_streak(), 0);
        assert_eq!(*stats.best_streak(), 2);
    }

    #[test]
    fn test_draw_resets_streak() {
        let mut stats = UserStats::zeroed("alice".into());
        stats.apply_win();
        stats.apply_draw();
        assert_eq!(*stats.draws(), 1);
        assert_eq!(*stats.win_streak(), 0);
        assert_eq!(*stats.best_streak(), 1);
    }

    #[test]
    fn test_counters_never_decrease() {
        let mut stats = UserStats::zeroed("alice".into());
        stats.apply_win();
        stats.apply_loss();
        stats.apply_draw();
        assert_eq!((*stats.wins(), *stats.losses(), *stats.draws()), (1, 1, 1));
    }
}
