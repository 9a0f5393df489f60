//! Win and draw detection.

use super::{Board, Mark};

/// The eight winning lines: three rows, three columns, two diagonals.
///
/// The scan order is fixed so the reported line is deterministic for a
/// given board.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Checks the board for a completed line.
///
/// Returns the winning mark and the cells of the first matching line in
/// [`WIN_LINES`] order. The engine checks after every single move, so at
/// most one mark can have a line when this runs.
pub fn winner(board: &Board) -> Option<(Mark, [usize; 3])> {
    for line in WIN_LINES {
        let [a, b, c] = line;
        if let Some(Some(mark)) = board.get(a) {
            if board.get(b) == Some(Some(mark)) && board.get(c) == Some(Some(mark)) {
                return Some((mark, line));
            }
        }
    }
    None
}

/// True iff every cell is occupied and no line is complete.
pub fn is_draw(board: &Board) -> bool {
    board.is_full() && winner(board).is_none()
}
