//! Core domain types for the 3x3 board.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A player's token, X or O.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Mark {
    /// X always moves first.
    X,
    /// O moves second.
    O,
}

impl Mark {
    /// Returns the other mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// One board cell: empty or holding a mark.
pub type Cell = Option<Mark>;

/// 3x3 tic-tac-toe board, cells in row-major order (0-8).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: [Cell; 9],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the cell at the given index, `None` if out of range.
    pub fn get(&self, cell: usize) -> Option<Cell> {
        self.cells.get(cell).copied()
    }

    /// Checks whether a cell is in range and unoccupied.
    pub fn is_empty(&self, cell: usize) -> bool {
        matches!(self.get(cell), Some(None))
    }

    /// Places `mark` at `cell`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidMove`] if the cell is out of range or
    /// already occupied.
    pub fn apply(&mut self, cell: usize, mark: Mark) -> Result<(), EngineError> {
        if !self.is_empty(cell) {
            return Err(EngineError::InvalidMove { cell });
        }
        self.cells[cell] = Some(mark);
        Ok(())
    }

    /// Removes the mark at `cell`. Used by the search to undo trial moves.
    pub(crate) fn clear(&mut self, cell: usize) {
        self.cells[cell] = None;
    }

    /// Indices of all unoccupied cells, ascending.
    pub fn empty_cells(&self) -> Vec<usize> {
        (0..9).filter(|&i| self.cells[i].is_none()).collect()
    }

    /// True if every cell is occupied.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| c.is_some())
    }

    /// All cells as a slice.
    pub fn cells(&self) -> &[Cell; 9] {
        &self.cells
    }

    /// Formats the board as a three-line grid for logs.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let cell = row * 3 + col;
                out.push(match self.cells[cell] {
                    Some(Mark::X) => 'X',
                    Some(Mark::O) => 'O',
                    None => '.',
                });
                if col < 2 {
                    out.push('|');
                }
            }
            if row < 2 {
                out.push('\n');
            }
        }
        out
    }
}
