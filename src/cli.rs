//! Command-line interface for the gridmatch engine.

use clap::Parser;

/// Gridmatch - concurrent tic-tac-toe session engine
#[derive(Parser, Debug)]
#[command(name = "gridmatch")]
#[command(about = "Game-session engine with per-session locking and SQLite persistence", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the database file (created if it doesn't exist)
    #[arg(long, default_value = "gridmatch.db")]
    pub db_path: String,

    /// Seconds of inactivity before an unfinished session is forfeited
    #[arg(long, default_value = "300")]
    pub inactivity_secs: u64,

    /// Seconds a finished session is retained before deletion
    #[arg(long, default_value = "86400")]
    pub retention_secs: u64,

    /// Seconds between reaper sweeps
    #[arg(long, default_value = "30")]
    pub sweep_interval_secs: u64,
}
