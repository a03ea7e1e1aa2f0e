//! # LCPS Observer CLI
//!
//! Entry point: argument parsing, logging initialization, pipeline lifecycle
//! and signal-driven shutdown.

mod app;
mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use app::ObserverApp;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "LCPS observer starting"
    );

    let mut observer = ObserverApp::build(&cli).await?;
    let result = observer.run().await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "observer failed");
    }

    result
}

/// Initialize logging based on CLI options.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    observability::init_with_config(observability::ObservabilityConfig {
        log_format: cli.log_format.into(),
        default_log_level: default_log_level.to_string(),
    })
}
