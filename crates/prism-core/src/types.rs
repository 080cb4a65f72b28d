//! Core data types for a stage invocation.
//!
//! A [`StageRequest`] is built fresh from each trigger payload and a
//! [`StageResult`] is returned for every invocation. Neither outlives the call;
//! the objects in the store are the only hand-off between stages.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Ordered telemetry attributes. Insertion order is preserved and re-setting
/// a name keeps its original position.
pub type Attributes = serde_json::Map<String, Value>;

/// Address of one object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// The key's last `/`-delimited segment.
    pub fn filename(&self) -> &str {
        filename_from_key(&self.key)
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Extract the filename from a slash-delimited key.
///
/// `"input/photo.jpg"` yields `"photo.jpg"`; a key with no `/` is returned
/// whole. The result is reused verbatim under the next stage's prefix.
pub fn filename_from_key(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

/// Where a direct invocation's input comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectInput {
    /// Decoded image bytes supplied in the payload
    Inline(Vec<u8>),
    /// A store reference for the handler to fetch
    Reference(ObjectLocation),
}

/// One invocation's request, resolved once by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageRequest {
    /// A new object appeared in the store
    EventTriggered(ObjectLocation),

    /// A caller supplied the input directly
    DirectInvocation {
        input: DirectInput,
        /// Reporting label only; never used for dispatch
        operation: Option<String>,
    },
}

impl StageRequest {
    pub fn event(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::EventTriggered(ObjectLocation::new(bucket, key))
    }

    pub fn mode(&self) -> InvocationMode {
        match self {
            Self::EventTriggered(_) => InvocationMode::Event,
            Self::DirectInvocation { .. } => InvocationMode::Direct,
        }
    }

    /// The store location input is read from, if any.
    pub fn source(&self) -> Option<&ObjectLocation> {
        match self {
            Self::EventTriggered(location)
            | Self::DirectInvocation {
                input: DirectInput::Reference(location),
                ..
            } => Some(location),
            Self::DirectInvocation {
                input: DirectInput::Inline(_),
                ..
            } => None,
        }
    }
}

/// How an invocation was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    Event,
    Direct,
}

/// The outcome of one stage invocation. Always produced, success or not.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    /// Whether the image was transformed and delivered
    pub success: bool,

    /// How the invocation was triggered
    pub mode: InvocationMode,

    /// Finished telemetry, in first-insertion order
    pub attributes: Attributes,

    /// Where the output was written (store-writing paths only)
    pub output_location: Option<ObjectLocation>,

    /// Encoded output image (inline direct invocations only)
    pub output_bytes: Option<Vec<u8>>,

    /// Human-readable failure description
    pub error_message: Option<String>,

    /// Echoed operation label for direct invocations
    pub operation: Option<String>,
}

impl StageResult {
    /// Output bytes as the base64 string returned at the payload boundary.
    pub fn output_base64(&self) -> Option<String> {
        self.output_bytes.as_ref().map(|bytes| BASE64.encode(bytes))
    }

    /// The result payload returned to the caller.
    ///
    /// Event-triggered invocations return telemetry only. Direct invocations
    /// also carry `operation` and, for inline input, the base64 `image_data`.
    pub fn to_payload(&self) -> Attributes {
        let mut payload = self.attributes.clone();
        if self.mode == InvocationMode::Direct {
            if let Some(data) = self.output_base64() {
                payload.insert("image_data".to_string(), Value::String(data));
            }
            if let Some(operation) = &self.operation {
                payload.insert("operation".to_string(), Value::String(operation.clone()));
            }
        }
        payload
    }

    /// The payload without `image_data`, suitable for logs.
    pub fn redacted(&self) -> Attributes {
        let mut payload = self.to_payload();
        payload.remove("image_data");
        payload
    }
}
