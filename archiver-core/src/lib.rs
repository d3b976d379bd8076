//! Core library for the `weather-archiver` service.
//!
//! This crate defines:
//! - Configuration from the environment and an optional settings file
//! - The weather source capability and its OpenWeather client
//! - The blob sink capability and its Azure Blob Storage client
//! - The fetch-and-store pipeline and the cron timer that drives it
//!
//! It is used by `weather-archiver`, but the pipeline can be driven by any scheduler.

pub mod config;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod schedule;
pub mod storage;

pub use config::{Config, FetchErrorPolicy, Settings};
pub use model::{BlobName, WeatherResult};
pub use pipeline::{Pipeline, RunOutcome};
pub use provider::{WeatherSource, openweather::OpenWeatherClient};
pub use schedule::{ScheduleError, Timer};
pub use storage::{BlobSink, StorageError, azure::AzureBlobSink};
