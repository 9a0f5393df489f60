//! Board model: pure value types and rules, no I/O.

mod types;

pub mod rules;

pub use types::{Board, Cell, Mark};
