//! Binary crate for the `weather-archiver` service.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Logging setup
//! - Wiring the live OpenWeather and Azure clients into the pipeline

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
