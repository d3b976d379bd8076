use crate::{Config, WeatherResult};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod openweather;

/// Something that can produce a weather reading for a coordinate pair.
///
/// Failures are part of the returned value, never an `Err`.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn fetch(&self, lat: &str, lon: &str, api_key: &str) -> WeatherResult;
}

/// Convenience: fetch using the coordinates and key held by `config`.
pub async fn fetch_for(source: &dyn WeatherSource, config: &Config) -> WeatherResult {
    source
        .fetch(&config.lat, &config.lon, &config.api_key)
        .await
}
