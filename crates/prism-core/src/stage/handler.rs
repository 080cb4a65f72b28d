//! Stage execution: fetch, transform, store, report.

use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

use super::StageKind;
use crate::config::Config;
use crate::error::{StageError, StageOutcome, TransformError};
use crate::metrics::MetricsCollector;
use crate::router::PipelineRouter;
use crate::store::ObjectStore;
use crate::transform::{CodecTransform, ImageTransform, TransformOutput};
use crate::types::{DirectInput, InvocationMode, ObjectLocation, StageRequest, StageResult};

/// Where a successful invocation delivered its output.
enum Delivery {
    Stored(ObjectLocation),
    Inline(Vec<u8>),
}

/// One pipeline stage: a transform plus the location it writes to.
///
/// Handlers hold only static configuration and injected capabilities, so one
/// instance can serve any number of concurrent invocations.
pub struct StageHandler {
    name: String,
    transform: Arc<dyn ImageTransform>,
    store: Arc<dyn ObjectStore>,
    output_prefix: String,
    output_bucket: Option<String>,
    preserve_content_type: bool,
}

impl StageHandler {
    /// Create a handler writing under `output_prefix` in the source bucket.
    pub fn new(
        name: impl Into<String>,
        transform: Arc<dyn ImageTransform>,
        store: Arc<dyn ObjectStore>,
        output_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            transform,
            store,
            output_prefix: output_prefix.into(),
            output_bucket: None,
            preserve_content_type: false,
        }
    }

    /// Write output to a fixed bucket instead of the source bucket.
    pub fn with_output_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.output_bucket = Some(bucket.into());
        self
    }

    /// Copy the source object's content type onto the output object.
    pub fn with_preserved_content_type(mut self, preserve: bool) -> Self {
        self.preserve_content_type = preserve;
        self
    }

    /// Build the standard handler for a stage kind from configuration.
    pub fn for_kind(kind: StageKind, config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        let route = config.stage_route(kind);
        let transform = CodecTransform::new(
            kind.transform(&config.transform),
            config.limits.clone(),
            &config.transform,
        );
        let handler = Self::new(kind.name(), Arc::new(transform), store, route.output_prefix)
            .with_preserved_content_type(route.preserve_content_type);
        match route.output_bucket {
            Some(bucket) => handler.with_output_bucket(bucket),
            None => handler,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_prefix(&self) -> &str {
        &self.output_prefix
    }

    /// Where output for a given source object would be written.
    ///
    /// `None` when the key has no filename (e.g. it ends in `/`).
    pub fn destination_for(&self, source: &ObjectLocation) -> Option<ObjectLocation> {
        let filename = source.filename();
        if filename.is_empty() {
            return None;
        }
        let bucket = self
            .output_bucket
            .clone()
            .unwrap_or_else(|| source.bucket.clone());
        Some(ObjectLocation::new(
            bucket,
            format!("{}{}", self.output_prefix, filename),
        ))
    }

    /// Route a raw trigger payload and execute it.
    ///
    /// A payload that cannot be routed still produces a failed result with
    /// telemetry; nothing is read or written.
    pub async fn handle(&self, payload: &Value) -> StageResult {
        match PipelineRouter::route(payload) {
            Ok(request) => self.execute(request).await,
            Err(err) => {
                let mode = match payload.get("Records").and_then(Value::as_array) {
                    Some(records) if !records.is_empty() => InvocationMode::Event,
                    _ => InvocationMode::Direct,
                };
                let operation = (mode == InvocationMode::Direct).then(|| {
                    payload
                        .get("operation")
                        .and_then(Value::as_str)
                        .unwrap_or(&self.name)
                        .to_string()
                });

                let span = tracing::info_span!("stage", stage = %self.name);
                let _guard = span.enter();
                let mut metrics = self.begin(operation.as_deref());
                metrics.add_attribute("input_source", "unknown");
                self.report(metrics, mode, operation, Err(err))
            }
        }
    }

    /// Execute one invocation. Never fails: every error is captured in the
    /// returned result.
    pub async fn execute(&self, request: StageRequest) -> StageResult {
        let span = tracing::info_span!("stage", stage = %self.name);
        self.execute_in_span(request).instrument(span).await
    }

    async fn execute_in_span(&self, request: StageRequest) -> StageResult {
        let mode = request.mode();
        let (input, operation) = match request {
            StageRequest::EventTriggered(location) => (DirectInput::Reference(location), None),
            StageRequest::DirectInvocation { input, operation } => {
                (input, Some(operation.unwrap_or_else(|| self.name.clone())))
            }
        };

        let mut metrics = self.begin(operation.as_deref());
        let outcome = self.run(mode, input, &mut metrics).await;
        self.report(metrics, mode, operation, outcome)
    }

    fn begin(&self, operation: Option<&str>) -> MetricsCollector {
        let mut metrics = MetricsCollector::new();
        metrics.snapshot_start();
        metrics.add_attribute("stage", self.name.as_str());
        if let Some(operation) = operation {
            metrics.add_attribute("operation", operation);
        }
        metrics
    }

    async fn run(
        &self,
        mode: InvocationMode,
        input: DirectInput,
        metrics: &mut MetricsCollector,
    ) -> StageOutcome<Delivery> {
        match input {
            DirectInput::Inline(bytes) => {
                metrics.add_attribute("input_source", "payload");
                metrics.add_attribute("input_size", bytes.len());
                let output = self.apply_transform(bytes, metrics).await?;
                Ok(Delivery::Inline(output.bytes))
            }
            DirectInput::Reference(source) => {
                let input_source = match mode {
                    InvocationMode::Event => "event",
                    InvocationMode::Direct => "s3",
                };
                metrics.add_attribute("input_source", input_source);
                metrics.add_attribute("input_bucket", source.bucket.as_str());
                metrics.add_attribute("input_key", source.key.as_str());

                let destination = self.destination_for(&source).ok_or_else(|| {
                    StageError::InvalidRequest(format!(
                        "no filename can be derived from key '{}'",
                        source.key
                    ))
                })?;
                metrics.add_attribute("image_id", source.filename());

                let object = self.store.get(&source.bucket, &source.key).await?;
                metrics.add_attribute("input_size", object.bytes.len());
                let source_content_type = object.content_type;

                let output = self.apply_transform(object.bytes, metrics).await?;
                let content_type = if self.preserve_content_type && !source_content_type.is_empty() {
                    source_content_type
                } else {
                    output.content_type
                };

                self.store
                    .put(
                        &destination.bucket,
                        &destination.key,
                        output.bytes,
                        &content_type,
                    )
                    .await?;
                metrics.add_attribute("output_bucket", destination.bucket.as_str());
                metrics.add_attribute("output_key", destination.key.as_str());
                metrics.add_attribute("content_type", content_type);
                Ok(Delivery::Stored(destination))
            }
        }
    }

    /// Run the transform on the blocking pool and record what it produced.
    async fn apply_transform(
        &self,
        bytes: Vec<u8>,
        metrics: &mut MetricsCollector,
    ) -> StageOutcome<TransformOutput> {
        metrics.add_attribute("transform", self.transform.name());
        let transform = Arc::clone(&self.transform);
        let output = tokio::task::spawn_blocking(move || transform.apply(&bytes))
            .await
            .map_err(|e| TransformError::Task(e.to_string()))??;

        metrics.add_attribute("input_format", output.input_format.as_str());
        metrics.add_attribute("input_width", output.input_dimensions.0);
        metrics.add_attribute("input_height", output.input_dimensions.1);
        metrics.add_attribute("output_width", output.output_dimensions.0);
        metrics.add_attribute("output_height", output.output_dimensions.1);
        metrics.add_attribute("output_size", output.bytes.len());
        Ok(output)
    }

    /// Close the metrics scope and assemble the result.
    fn report(
        &self,
        mut metrics: MetricsCollector,
        mode: InvocationMode,
        operation: Option<String>,
        outcome: StageOutcome<Delivery>,
    ) -> StageResult {
        let (success, output_location, output_bytes, error_message) = match outcome {
            Ok(Delivery::Stored(location)) => {
                metrics.add_attribute("success", true);
                metrics.add_attribute(
                    "message",
                    format!("{}: image written to {}", self.name, location),
                );
                (true, Some(location), None, None)
            }
            Ok(Delivery::Inline(bytes)) => {
                metrics.add_attribute("success", true);
                metrics.add_attribute("message", format!("{}: image returned inline", self.name));
                (true, None, Some(bytes), None)
            }
            Err(err) => {
                let message = err.to_string();
                metrics.add_attribute("success", false);
                metrics.add_attribute("message", format!("{}: processing failed", self.name));
                metrics.add_attribute("error", message.as_str());
                metrics.add_attribute("error_kind", err.kind());
                (false, None, None, Some(message))
            }
        };

        metrics.snapshot_end_and_compute_deltas();
        let result = StageResult {
            success,
            mode,
            attributes: metrics.finish(),
            output_location,
            output_bytes,
            error_message,
            operation,
        };

        let logged = Value::Object(result.redacted());
        if result.success {
            tracing::info!(metrics = %logged, "Stage completed");
        } else {
            tracing::warn!(metrics = %logged, "Stage failed");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoredObject, DEFAULT_CONTENT_TYPE};
    use async_trait::async_trait;
    use serde_json::json;

    /// Reverses the input bytes; rejects empty input.
    struct ReverseTransform;

    impl ImageTransform for ReverseTransform {
        fn name(&self) -> &str {
            "reverse"
        }

        fn apply(&self, bytes: &[u8]) -> Result<TransformOutput, TransformError> {
            if bytes.is_empty() {
                return Err(TransformError::Decode("empty input".into()));
            }
            let mut reversed = bytes.to_vec();
            reversed.reverse();
            Ok(TransformOutput {
                bytes: reversed,
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                input_format: "raw".into(),
                input_dimensions: (bytes.len() as u32, 1),
                output_dimensions: (bytes.len() as u32, 1),
            })
        }
    }

    /// Serves reads from an inner store and refuses every write.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait]
    impl ObjectStore for ReadOnlyStore {
        fn name(&self) -> &str {
            "read-only"
        }

        async fn get(&self, bucket: &str, key: &str) -> Result<StoredObject, StoreError> {
            self.0.get(bucket, key).await
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<(), StoreError> {
            Err(StoreError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message: "read-only".into(),
            })
        }
    }

    fn handler(store: Arc<dyn ObjectStore>) -> StageHandler {
        StageHandler::new("reverse", Arc::new(ReverseTransform), store, "stage1/")
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .put("B", "input/photo.jpg", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_event_writes_to_next_prefix() {
        let store = seeded_store().await;
        let result = handler(store.clone())
            .execute(StageRequest::event("B", "input/photo.jpg"))
            .await;

        assert!(result.success, "{:?}", result.error_message);
        assert_eq!(
            result.output_location,
            Some(ObjectLocation::new("B", "stage1/photo.jpg"))
        );
        assert_eq!(result.output_bytes, None);
        let written = store.get("B", "stage1/photo.jpg").await.unwrap();
        assert_eq!(written.bytes, vec![3, 2, 1]);
        assert_eq!(written.content_type, "image/jpeg");

        assert_eq!(result.attributes["input_source"], json!("event"));
        assert_eq!(result.attributes["image_id"], json!("photo.jpg"));
        assert_eq!(result.attributes["output_key"], json!("stage1/photo.jpg"));
        assert!(result.attributes.contains_key("runtime"));
    }

    #[tokio::test]
    async fn test_output_bucket_override() {
        let store = seeded_store().await;
        let result = handler(store.clone())
            .with_output_bucket("Other")
            .execute(StageRequest::event("B", "input/photo.jpg"))
            .await;
        assert_eq!(
            result.output_location,
            Some(ObjectLocation::new("Other", "stage1/photo.jpg"))
        );
        assert!(store.get("Other", "stage1/photo.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_preserved_content_type() {
        let store = seeded_store().await;
        handler(store.clone())
            .with_preserved_content_type(true)
            .execute(StageRequest::event("B", "input/photo.jpg"))
            .await;
        let written = store.get("B", "stage1/photo.jpg").await.unwrap();
        assert_eq!(written.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_direct_reference_writes_and_echoes_operation() {
        let store = seeded_store().await;
        let result = handler(store.clone())
            .handle(&json!({ "s3_bucket": "B", "s3_key": "input/photo.jpg", "operation": "flip" }))
            .await;

        assert!(result.success);
        assert_eq!(result.mode, InvocationMode::Direct);
        assert_eq!(result.operation.as_deref(), Some("flip"));
        assert_eq!(result.attributes["input_source"], json!("s3"));
        let payload = result.to_payload();
        assert_eq!(payload["operation"], json!("flip"));
        assert!(!payload.contains_key("image_data"));
    }

    #[tokio::test]
    async fn test_inline_input_returns_bytes_without_store_access() {
        let store = Arc::new(MemoryStore::new());
        let result = handler(store.clone())
            .handle(&json!({ "image_data": "AQID" }))
            .await;

        assert!(result.success);
        assert_eq!(result.output_bytes, Some(vec![3, 2, 1]));
        assert_eq!(result.output_location, None);
        assert!(store.is_empty().await);
        // operation defaults to the stage name
        assert_eq!(result.to_payload()["operation"], json!("reverse"));
        assert_eq!(result.to_payload()["image_data"], json!("AwIB"));
    }

    #[tokio::test]
    async fn test_missing_object_fails_with_telemetry() {
        let store = Arc::new(MemoryStore::new());
        let result = handler(store.clone())
            .handle(&json!({ "s3_bucket": "B", "s3_key": "missing.jpg", "operation": "zoom" }))
            .await;

        assert!(!result.success);
        assert!(!result.error_message.as_deref().unwrap_or_default().is_empty());
        assert_eq!(result.output_bytes, None);
        assert_eq!(result.output_location, None);
        assert_eq!(result.attributes["error_kind"], json!("NotFound"));
        assert_eq!(result.attributes["success"], json!(false));
        assert!(result.attributes.contains_key("runtime"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_transform_failure_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.put("B", "input/empty.jpg", vec![], "image/jpeg").await.unwrap();

        let result = handler(store.clone())
            .execute(StageRequest::event("B", "input/empty.jpg"))
            .await;

        assert!(!result.success);
        assert_eq!(result.attributes["error_kind"], json!("TransformError"));
        assert_eq!(store.keys("B").await, vec!["input/empty.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_write_failure_reports_no_output() {
        let inner = MemoryStore::new();
        inner.put("B", "input/photo.jpg", vec![1], "image/jpeg").await.unwrap();
        let result = handler(Arc::new(ReadOnlyStore(inner)))
            .execute(StageRequest::event("B", "input/photo.jpg"))
            .await;

        assert!(!result.success);
        assert_eq!(result.output_location, None);
        assert_eq!(result.attributes["error_kind"], json!("AccessDenied"));
        assert!(!result.attributes.contains_key("output_key"));
    }

    #[tokio::test]
    async fn test_key_without_filename_is_invalid_before_fetch() {
        let store = Arc::new(MemoryStore::new());
        let result = handler(store)
            .execute(StageRequest::event("B", "input/"))
            .await;
        assert!(!result.success);
        assert_eq!(result.attributes["error_kind"], json!("InvalidRequest"));
        assert!(!result.attributes.contains_key("input_size"));
    }

    #[tokio::test]
    async fn test_unroutable_payload_still_reports() {
        let store = Arc::new(MemoryStore::new());
        let result = handler(store)
            .handle(&json!({ "operation": "resize" }))
            .await;

        assert!(!result.success);
        assert_eq!(result.mode, InvocationMode::Direct);
        assert_eq!(result.attributes["error_kind"], json!("InvalidRequest"));
        assert_eq!(result.attributes["operation"], json!("resize"));
        assert!(result.attributes.contains_key("version"));
    }

    #[tokio::test]
    async fn test_attribute_order_is_stable() {
        let store = seeded_store().await;
        let result = handler(store)
            .execute(StageRequest::event("B", "input/photo.jpg"))
            .await;
        let keys: Vec<&str> = result.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys[..5], ["version", "lang", "container_id", "start_time", "stage"]);
    }

    #[tokio::test]
    async fn test_concurrent_invocations_are_independent() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..16 {
            store
                .put("B", &format!("input/{i}.jpg"), vec![i as u8, 0xAA], "image/jpeg")
                .await
                .unwrap();
        }
        let handler = Arc::new(handler(store.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler
                        .execute(StageRequest::event("B", format!("input/{i}.jpg")))
                        .await
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let result = task.await.unwrap();
            assert!(result.success);
            let written = store.get("B", &format!("stage1/{i}.jpg")).await.unwrap();
            assert_eq!(written.bytes, vec![0xAA, i as u8]);
        }
    }
}
