use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// Latitude of the archived location (Santiago, CL).
pub const LAT: &str = "-33.437778";
/// Longitude of the archived location (Santiago, CL).
pub const LON: &str = "-70.650278";

pub const API_KEY_VAR: &str = "API_KEY";
pub const CONNECTION_STRING_VAR: &str = "STORAGE_CONNECTION_STRING";
pub const CONTAINER_VAR: &str = "CONTAINERNAME";

/// Credentials and destination for one archiver process.
///
/// Built once at startup and handed to the pipeline by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub lat: String,
    pub lon: String,
    pub storage_connection_string: String,
    pub container_name: String,
}

impl Config {
    /// Read the three variables from the environment (after loading `.env` if present)
    /// and pair them with the compiled-in coordinates.
    ///
    /// Unset variables become empty strings; [`Config::is_valid`] decides whether a run may proceed.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            api_key: env_or_empty(API_KEY_VAR),
            lat: LAT.to_string(),
            lon: LON.to_string(),
            storage_connection_string: env_or_empty(CONNECTION_STRING_VAR),
            container_name: env_or_empty(CONTAINER_VAR),
        }
    }

    /// `true` iff every required field is non-empty.
    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Names of the fields that are empty or whitespace-only.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("api_key", &self.api_key),
            ("lat", &self.lat),
            ("lon", &self.lon),
            ("storage_connection_string", &self.storage_connection_string),
            ("container_name", &self.container_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

fn env_or_empty(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

/// What to do with a fetch that came back as an error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorPolicy {
    /// Log and end the run without writing a blob.
    #[default]
    Skip,
    /// Persist the `{"error": ...}` document like any other payload.
    Upload,
}

/// Runtime knobs stored on disk as TOML.
///
/// Example:
/// ```toml
/// schedule = "0 */5 * * * *"
/// run_on_startup = true
/// request_timeout_secs = 15
/// on_fetch_error = "upload"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Cron expression with a leading seconds field.
    pub schedule: String,
    pub run_on_startup: bool,
    pub request_timeout_secs: u64,
    pub on_fetch_error: FetchErrorPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedule: "*/10 * * * * *".to_string(),
            run_on_startup: false,
            request_timeout_secs: 30,
            on_fetch_error: FetchErrorPolicy::default(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load settings from `path`, or from the platform config dir when `None`.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::settings_file_path()?,
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        if settings.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be greater than zero"));
        }
        Ok(settings)
    }

    /// Path to the default settings file.
    pub fn settings_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-archiver", "weather-archiver")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("settings.toml"))
    }
}
