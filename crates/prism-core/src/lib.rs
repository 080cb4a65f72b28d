//! Prism Core - staged image processing.
//!
//! Prism is a chain of independent image stages wired together by object
//! store prefixes. Each stage reads one image, applies one transform, and
//! writes the result under the next stage's prefix:
//!
//! ```text
//! input/ → rotate 180° → stage1/ → resize ×1.5 | centre zoom → stage2/ → greyscale → output/
//! ```
//!
//! A stage can also be invoked directly, with inline base64 image data
//! (the result comes back inline) or with a bucket/key reference. Every
//! invocation, successful or not, returns a [`StageResult`] carrying ordered
//! telemetry.
//!
//! # Usage
//!
//! ```rust,ignore
//! use prism_core::{Config, MemoryStore, StageHandler, StageKind};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load().unwrap_or_default();
//!     let store = Arc::new(MemoryStore::new());
//!     let rotate = StageHandler::for_kind(StageKind::Rotate, &config, store);
//!
//!     let payload = serde_json::json!({ "s3_bucket": "photos", "s3_key": "input/a.jpg" });
//!     let result = rotate.handle(&payload).await;
//!     println!("{}", serde_json::Value::Object(result.redacted()));
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod output;
pub mod pipeline;
pub mod router;
pub mod stage;
pub mod store;
pub mod transform;
pub mod types;

pub use config::Config;
pub use error::{
    ConfigError, PrismError, Result, StageError, StageOutcome, StoreError, TransformError,
};
pub use metrics::MetricsCollector;
pub use output::{OutputFormat, ResultWriter};
pub use pipeline::Pipeline;
pub use router::PipelineRouter;
pub use stage::{IngestHandler, StageHandler, StageKind};
pub use store::{FileSystemStore, MemoryStore, ObjectStore, StoredObject};
pub use transform::{CodecTransform, ImageTransform, Transform, TransformOutput};
pub use types::{
    Attributes, DirectInput, InvocationMode, ObjectLocation, StageRequest, StageResult,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
