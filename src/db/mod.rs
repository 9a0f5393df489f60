//! Durable persistence for sessions and per-user statistics.

mod error;
mod models;
mod repository;
mod schema; // Diesel schema - internal use only

pub use error::DbError;
pub use models::{SessionRow, UserStats};
pub use repository::SessionStore;
