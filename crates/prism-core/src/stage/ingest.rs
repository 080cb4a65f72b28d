//! Chain entry point: store a caller-supplied image under the first stage's
//! input prefix.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

use super::StageKind;
use crate::config::Config;
use crate::error::{StageError, StageOutcome};
use crate::metrics::{epoch_millis, MetricsCollector};
use crate::store::{ObjectStore, DEFAULT_CONTENT_TYPE};
use crate::types::{InvocationMode, ObjectLocation, StageResult};

const STAGE_NAME: &str = "ingest";

/// Ingest payload: a base64 image and a label that becomes part of its key.
///
/// `language` is accepted for the label, matching the deployed clients.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IngestPayload {
    image: Option<String>,
    #[serde(alias = "language")]
    label: Option<String>,
}

/// Key for a newly ingested image: `<prefix><label>-image-<epoch ms>-<id8>.jpg`.
pub fn ingest_key(input_prefix: &str, label: &str, epoch_ms: u64, id: &uuid::Uuid) -> String {
    let id = id.simple().to_string();
    format!("{input_prefix}{label}-image-{epoch_ms}-{}.jpg", &id[..8])
}

/// Accepts images from callers and places them where the chain starts.
pub struct IngestHandler {
    store: Arc<dyn ObjectStore>,
    input_prefix: String,
}

impl IngestHandler {
    pub fn new(store: Arc<dyn ObjectStore>, input_prefix: impl Into<String>) -> Self {
        Self {
            store,
            input_prefix: input_prefix.into(),
        }
    }

    /// Ingest into the input prefix of the configured chain's first stage.
    pub fn from_config(config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        let first = config
            .pipeline
            .chain
            .first()
            .copied()
            .unwrap_or(StageKind::Rotate);
        Self::new(store, config.stage_route(first).input_prefix)
    }

    pub fn input_prefix(&self) -> &str {
        &self.input_prefix
    }

    /// Store the payload's image in `bucket` under a fresh key.
    ///
    /// Never fails: a missing field, bad base64, or a store error yields a
    /// failed result and nothing is written.
    pub async fn handle(&self, bucket: &str, payload: &Value) -> StageResult {
        let span = tracing::info_span!("stage", stage = STAGE_NAME);
        self.handle_in_span(bucket, payload).instrument(span).await
    }

    async fn handle_in_span(&self, bucket: &str, payload: &Value) -> StageResult {
        let mut metrics = MetricsCollector::new();
        metrics.snapshot_start();
        metrics.add_attribute("stage", STAGE_NAME);
        metrics.add_attribute("input_source", "payload");

        let outcome = match self.prepare(bucket, payload, &mut metrics) {
            Ok((location, bytes)) => self
                .store
                .put(&location.bucket, &location.key, bytes, DEFAULT_CONTENT_TYPE)
                .await
                .map(|()| location)
                .map_err(StageError::from),
            Err(err) => Err(err),
        };

        let (success, output_location, error_message) = match outcome {
            Ok(location) => {
                metrics.add_attribute("output_bucket", location.bucket.as_str());
                metrics.add_attribute("output_key", location.key.as_str());
                metrics.add_attribute("content_type", DEFAULT_CONTENT_TYPE);
                metrics.add_attribute("success", true);
                metrics.add_attribute("message", "Image successfully uploaded");
                (true, Some(location), None)
            }
            Err(err) => {
                let message = err.to_string();
                metrics.add_attribute("success", false);
                metrics.add_attribute("message", format!("{STAGE_NAME}: upload failed"));
                metrics.add_attribute("error", message.as_str());
                metrics.add_attribute("error_kind", err.kind());
                (false, None, Some(message))
            }
        };

        metrics.snapshot_end_and_compute_deltas();
        let result = StageResult {
            success,
            mode: InvocationMode::Direct,
            attributes: metrics.finish(),
            output_location,
            output_bytes: None,
            error_message,
            operation: None,
        };

        let logged = Value::Object(result.redacted());
        if result.success {
            tracing::info!(metrics = %logged, "Image ingested");
        } else {
            tracing::warn!(metrics = %logged, "Ingest failed");
        }
        result
    }

    /// Validate the payload and choose the destination, without any I/O.
    fn prepare(
        &self,
        bucket: &str,
        payload: &Value,
        metrics: &mut MetricsCollector,
    ) -> StageOutcome<(ObjectLocation, Vec<u8>)> {
        let parsed = if payload.is_object() {
            IngestPayload::deserialize(payload)
                .map_err(|e| StageError::InvalidRequest(format!("malformed ingest payload: {e}")))?
        } else {
            IngestPayload::default()
        };

        let image = parsed.image.filter(|image| !image.is_empty());
        let label = parsed.label.filter(|label| !label.trim().is_empty());
        let (Some(image), Some(label)) = (image, label) else {
            return Err(StageError::InvalidRequest(
                "Missing required fields: 'language' and 'image'".into(),
            ));
        };

        let label = label.trim().to_lowercase();
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(StageError::InvalidRequest(format!(
                "label '{label}' may only contain letters, digits, '-' and '_'"
            )));
        }
        metrics.add_attribute("label", label.as_str());

        let bytes = BASE64.decode(image.trim()).map_err(|e| {
            StageError::InvalidRequest(format!("Invalid base64 encoding for image: {e}"))
        })?;
        metrics.add_attribute("input_size", bytes.len());

        let key = ingest_key(
            &self.input_prefix,
            &label,
            epoch_millis(),
            &uuid::Uuid::new_v4(),
        );
        Ok((ObjectLocation::new(bucket, key), bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileSystemStore, MemoryStore};
    use serde_json::json;

    fn handler(store: Arc<MemoryStore>) -> IngestHandler {
        IngestHandler::from_config(&Config::default(), store)
    }

    #[test]
    fn test_ingest_key_layout() {
        let id = uuid::Uuid::parse_str("0123abcd-4567-89ef-0123-456789abcdef").unwrap();
        assert_eq!(
            ingest_key("input/", "python", 1_700_000_000_000, &id),
            "input/python-image-1700000000000-0123abcd.jpg"
        );
    }

    #[tokio::test]
    async fn test_ingest_stores_image_under_chain_input() {
        let store = Arc::new(MemoryStore::new());
        let payload = json!({ "language": "Java", "image": "AQID" });

        let result = handler(store.clone()).handle("B", &payload).await;

        assert!(result.success, "{:?}", result.error_message);
        let location = result.output_location.clone().unwrap();
        assert_eq!(location.bucket, "B");
        assert!(location.key.starts_with("input/java-image-"));
        assert!(location.key.ends_with(".jpg"));

        let stored = store.get("B", &location.key).await.unwrap();
        assert_eq!(stored.bytes, vec![1, 2, 3]);
        assert_eq!(stored.content_type, "image/jpeg");
        assert_eq!(result.attributes["input_size"], json!(3));
        assert_eq!(result.attributes["output_key"], json!(location.key));
    }

    #[tokio::test]
    async fn test_ingest_keys_are_unique() {
        let store = Arc::new(MemoryStore::new());
        let ingest = handler(store.clone());
        let payload = json!({ "label": "js", "image": "AQID" });

        let first = ingest.handle("B", &payload).await;
        let second = ingest.handle("B", &payload).await;

        assert_ne!(first.output_location, second.output_location);
        assert_eq!(store.len().await, 2);
    }

    #[test]
    fn test_ingest_follows_configured_chain_start() {
        let config = Config::from_toml("[stages.rotate]\ninput_prefix = \"raw/\"\n").unwrap();
        let ingest = IngestHandler::from_config(&config, Arc::new(MemoryStore::new()));
        assert_eq!(ingest.input_prefix(), "raw/");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let payload = json!({ "language": "python", "image": "***" });

        let result = handler(store.clone()).handle("B", &payload).await;

        assert!(!result.success);
        assert_eq!(result.attributes["error_kind"], json!("InvalidRequest"));
        assert!(result
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("Invalid base64"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_field_is_rejected() {
        let store = Arc::new(MemoryStore::new());

        for payload in [
            json!({ "image": "AQID" }),
            json!({ "language": "python" }),
            json!({ "language": "", "image": "AQID" }),
            json!("AQID"),
        ] {
            let result = handler(store.clone()).handle("B", &payload).await;
            assert!(!result.success);
            assert!(result
                .error_message
                .as_deref()
                .unwrap_or_default()
                .contains("Missing required fields"));
            assert_eq!(result.output_location, None);
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_label_cannot_escape_the_prefix() {
        let store = Arc::new(MemoryStore::new());
        let payload = json!({ "label": "../etc", "image": "AQID" });

        let result = handler(store.clone()).handle("B", &payload).await;

        assert!(!result.success);
        assert_eq!(result.attributes["error_kind"], json!("InvalidRequest"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ingest = IngestHandler::new(Arc::new(FileSystemStore::new(dir.path())), "input/");

        let result = ingest
            .handle("..", &json!({ "label": "python", "image": "AQID" }))
            .await;

        assert!(!result.success);
        assert_eq!(result.attributes["error_kind"], json!("AccessDenied"));
        assert!(!result.attributes.contains_key("output_key"));
    }
}
