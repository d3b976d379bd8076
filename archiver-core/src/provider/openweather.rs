use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::model::WeatherResult;

use super::WeatherSource;

pub const CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// OpenWeather "current weather" client, metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: Client,
    url: String,
}

impl OpenWeatherClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_url(CURRENT_WEATHER_URL, timeout)
    }

    /// Point the client at another endpoint (a local mock, a proxy).
    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: url.into(),
        })
    }

    async fn fetch_current(&self, lat: &str, lon: &str, api_key: &str) -> Result<Value> {
        let res = self
            .http
            .get(&self.url)
            .query(&[
                ("lat", lat),
                ("lon", lon),
                ("units", "metric"),
                ("appid", api_key),
            ])
            .send()
            .await
            .context("Failed to send request to OpenWeather (current weather)")?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;

        if status != StatusCode::OK {
            return Err(anyhow!(
                "OpenWeather current request failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        serde_json::from_str(&body).context("Failed to parse OpenWeather current JSON")
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn fetch(&self, lat: &str, lon: &str, api_key: &str) -> WeatherResult {
        match self.fetch_current(lat, lon, api_key).await {
            Ok(body) => {
                debug!(lat, lon, "OpenWeather current data received");
                WeatherResult::Data(body)
            }
            Err(e) => {
                warn!("{e:#}");
                WeatherResult::failed()
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
