use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    BlobName, BlobSink, Config, FetchErrorPolicy, WeatherResult, WeatherSource,
    provider::fetch_for,
};

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Configuration incomplete; nothing was fetched or written.
    InvalidConfig { missing: Vec<&'static str> },
    /// The fetch failed and the policy said not to persist it.
    FetchSkipped,
    /// A document was written under `name`. `fetch_failed` marks an error document.
    Uploaded { name: BlobName, fetch_failed: bool },
    /// Serialization or the storage write failed; the error was logged.
    UploadFailed { name: BlobName, reason: String },
}

/// Validate → fetch → serialize → name → upload.
///
/// Holds no per-run state, so one instance can serve overlapping runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    source: Arc<dyn WeatherSource>,
    sink: Option<Arc<dyn BlobSink>>,
    on_fetch_error: FetchErrorPolicy,
}

impl Pipeline {
    /// `sink` is `None` when storage could not be set up; such runs end as `UploadFailed`.
    pub fn new(
        config: Arc<Config>,
        source: Arc<dyn WeatherSource>,
        sink: Option<Arc<dyn BlobSink>>,
        on_fetch_error: FetchErrorPolicy,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            on_fetch_error,
        }
    }

    pub async fn run_once(&self) -> RunOutcome {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit timestamp for the blob name.
    pub async fn run_at(&self, now: DateTime<Utc>) -> RunOutcome {
        if !self.config.is_valid() {
            let missing = self.config.missing_fields();
            error!(?missing, "Configuration incomplete, skipping run");
            return RunOutcome::InvalidConfig { missing };
        }

        let result = fetch_for(self.source.as_ref(), &self.config).await;
        let fetch_failed = result.is_error();

        if fetch_failed && self.on_fetch_error == FetchErrorPolicy::Skip {
            warn!("Weather fetch failed, no blob written for this run");
            return RunOutcome::FetchSkipped;
        }

        let name = BlobName::at(now);
        match self.store(&name, &result).await {
            Ok(()) => {
                info!("Blob named {name} uploaded successfully.");
                RunOutcome::Uploaded { name, fetch_failed }
            }
            Err(reason) => {
                error!("Error uploading blob: {reason}");
                RunOutcome::UploadFailed { name, reason }
            }
        }
    }

    async fn store(&self, name: &BlobName, result: &WeatherResult) -> Result<(), String> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| "blob storage is not configured".to_string())?;
        let document = result.to_document().map_err(|e| e.to_string())?;
        sink.upload(name, document.into_bytes())
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::{Value, json};
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct FixedSource {
        result: WeatherResult,
        calls: AtomicUsize,
    }

    impl FixedSource {
        fn new(result: WeatherResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl WeatherSource for FixedSource {
        async fn fetch(&self, _lat: &str, _lon: &str, _api_key: &str) -> WeatherResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[derive(Debug, Default)]
    struct MemorySink {
        blobs: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl MemorySink {
        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Self::default()
            })
        }

        fn blobs(&self) -> Vec<(String, Vec<u8>)> {
            self.blobs.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BlobSink for MemorySink {
        async fn upload(&self, name: &BlobName, body: Vec<u8>) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::Upload {
                    blob: name.to_string(),
                    source: Box::new(std::io::Error::other("connection reset")),
                });
            }
            self.blobs.lock().unwrap().push((name.to_string(), body));
            Ok(())
        }
    }

    fn config() -> Arc<Config> {
        Arc::new(Config {
            api_key: "KEY".into(),
            lat: crate::config::LAT.into(),
            lon: crate::config::LON.into(),
            storage_connection_string: "UseDevelopmentStorage=true".into(),
            container_name: "weather".into(),
        })
    }

    fn pipeline(
        config: Arc<Config>,
        source: Arc<FixedSource>,
        sink: Arc<MemorySink>,
        policy: FetchErrorPolicy,
    ) -> Pipeline {
        Pipeline::new(config, source, Some(sink as Arc<dyn BlobSink>), policy)
    }

    fn is_stamped_name(name: &str) -> bool {
        name.strip_prefix("data_")
            .and_then(|rest| rest.strip_suffix(".json"))
            .is_some_and(|stamp| stamp.len() == 14 && stamp.bytes().all(|b| b.is_ascii_digit()))
    }

    #[tokio::test]
    async fn successful_run_writes_exactly_one_blob() {
        let source = FixedSource::new(WeatherResult::Data(json!({"temp": 21.5})));
        let sink = Arc::new(MemorySink::default());
        let p = pipeline(config(), source, sink.clone(), FetchErrorPolicy::Skip);

        let outcome = p.run_once().await;
        assert!(matches!(outcome, RunOutcome::Uploaded { fetch_failed: false, .. }));

        let blobs = sink.blobs();
        assert_eq!(blobs.len(), 1);
        let (name, body) = &blobs[0];
        assert!(is_stamped_name(name), "unexpected name {name}");
        let parsed: Value = serde_json::from_slice(body).unwrap();
        assert_eq!(parsed, json!({"temp": 21.5}));
    }

    #[tokio::test]
    async fn name_follows_supplied_time() {
        let source = FixedSource::new(WeatherResult::Data(json!({})));
        let sink = Arc::new(MemorySink::default());
        let p = pipeline(config(), source, sink.clone(), FetchErrorPolicy::Skip);

        let when = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap();
        p.run_at(when).await;

        assert_eq!(sink.blobs()[0].0, "data_20240601123045.json");
    }

    #[tokio::test]
    async fn invalid_config_makes_no_calls() {
        let source = FixedSource::new(WeatherResult::Data(json!({"temp": 1})));
        let sink = Arc::new(MemorySink::default());
        let mut cfg = (*config()).clone();
        cfg.api_key.clear();
        let p = pipeline(Arc::new(cfg), source.clone(), sink.clone(), FetchErrorPolicy::Upload);

        let outcome = p.run_once().await;
        assert_eq!(
            outcome,
            RunOutcome::InvalidConfig {
                missing: vec!["api_key"]
            }
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(sink.blobs().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_is_skipped_by_default() {
        let source = FixedSource::new(WeatherResult::failed());
        let sink = Arc::new(MemorySink::default());
        let p = pipeline(config(), source, sink.clone(), FetchErrorPolicy::default());

        assert_eq!(p.run_once().await, RunOutcome::FetchSkipped);
        assert!(sink.blobs().is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_uploads_error_document_when_asked() {
        let source = FixedSource::new(WeatherResult::failed());
        let sink = Arc::new(MemorySink::default());
        let p = pipeline(config(), source, sink.clone(), FetchErrorPolicy::Upload);

        let outcome = p.run_once().await;
        assert!(matches!(outcome, RunOutcome::Uploaded { fetch_failed: true, .. }));

        let parsed: Value = serde_json::from_slice(&sink.blobs()[0].1).unwrap();
        assert_eq!(parsed, json!({"error": "Failed to request data"}));
    }

    #[tokio::test]
    #[traced_test]
    async fn storage_failure_is_reported_not_raised() {
        let source = FixedSource::new(WeatherResult::Data(json!({"temp": 21.5})));
        let p = pipeline(config(), source, MemorySink::failing(), FetchErrorPolicy::Skip);

        match p.run_once().await {
            RunOutcome::UploadFailed { reason, .. } => assert!(reason.contains("connection reset")),
            other => panic!("expected UploadFailed, got {other:?}"),
        }
        assert!(logs_contain("Error uploading blob"));
    }

    #[tokio::test]
    async fn missing_sink_is_an_upload_failure() {
        let source = FixedSource::new(WeatherResult::Data(json!({"temp": 21.5})));
        let p = Pipeline::new(config(), source, None, FetchErrorPolicy::Skip);

        assert!(matches!(p.run_once().await, RunOutcome::UploadFailed { .. }));
    }
}
