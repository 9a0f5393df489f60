//! Gridmatch engine entry point.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gridmatch::{App, ReaperConfig, TracingNotifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let config = ReaperConfig {
        inactivity: Duration::from_secs(cli.inactivity_secs),
        retention: Duration::from_secs(cli.retention_secs),
        interval: Duration::from_secs(cli.sweep_interval_secs),
    };

    info!("Starting gridmatch engine");
    let app = App::start(&cli.db_path, Arc::new(TracingNotifier), config)?;

    info!("Engine ready - press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    app.shutdown().await;
    Ok(())
}
