use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing::{error, info};
use weather_archiver_core::{
    AzureBlobSink, BlobSink, Config, OpenWeatherClient, Pipeline, RunOutcome, Settings, Timer,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-archiver",
    version,
    about = "Archive OpenWeather readings to Azure Blob Storage on a timer"
)]
pub struct Cli {
    /// Settings file; defaults to the platform config directory.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the timer until interrupted.
    Run {
        /// Override the cron schedule from the settings file.
        #[arg(long)]
        schedule: Option<String>,

        /// Fire once immediately before waiting for the first tick.
        #[arg(long)]
        run_on_startup: bool,
    },

    /// Perform a single fetch-and-store run.
    Once,

    /// Validate the environment configuration.
    Check,

    /// Print the next firing times of the schedule.
    Next {
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let settings = Settings::load(self.settings.as_deref())?;

        match self.command {
            Command::Run {
                schedule,
                run_on_startup,
            } => {
                let expr = schedule.unwrap_or_else(|| settings.schedule.clone());
                let timer = Timer::parse(&expr)?;
                let pipeline = build_pipeline(Config::from_env(), &settings)?;

                timer
                    .run(pipeline, run_on_startup || settings.run_on_startup, async {
                        tokio::signal::ctrl_c().await.ok();
                    })
                    .await?;
            }
            Command::Once => {
                let pipeline = build_pipeline(Config::from_env(), &settings)?;
                match pipeline.run_once().await {
                    RunOutcome::InvalidConfig { missing } => {
                        bail!("Configuration incomplete, missing: {}", missing.join(", "))
                    }
                    outcome => info!(?outcome, "Run finished"),
                }
            }
            Command::Check => {
                let config = Config::from_env();
                if !config.is_valid() {
                    bail!(
                        "Configuration incomplete, missing: {}",
                        config.missing_fields().join(", ")
                    );
                }
                AzureBlobSink::from_connection_string(
                    &config.storage_connection_string,
                    config.container_name.as_str(),
                )
                .context("Storage settings rejected")?;
                println!("Configuration OK (lat {}, lon {})", config.lat, config.lon);
            }
            Command::Next { count } => {
                let timer = Timer::parse(&settings.schedule)?;
                for at in timer.upcoming(Utc::now(), count) {
                    println!("{}", at.to_rfc3339());
                }
            }
        }

        Ok(())
    }
}

/// Build the live pipeline. A storage client that cannot be built is logged and left out,
/// so every run still validates, fetches and reports.
fn build_pipeline(config: Config, settings: &Settings) -> anyhow::Result<Pipeline> {
    let source = OpenWeatherClient::new(settings.request_timeout())?;

    let sink: Option<Arc<dyn BlobSink>> = if config.is_valid() {
        match AzureBlobSink::from_connection_string(
            &config.storage_connection_string,
            config.container_name.as_str(),
        ) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    } else {
        None
    };

    Ok(Pipeline::new(
        Arc::new(config),
        Arc::new(source),
        sink,
        settings.on_fetch_error,
    ))
}
