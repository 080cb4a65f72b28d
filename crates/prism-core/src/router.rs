//! Invocation-mode detection.
//!
//! A trigger payload is either a storage notification (a `Records` list) or a
//! direct call carrying inline image data or a store reference. The router
//! turns it into a [`StageRequest`] once, without any I/O, so handlers only
//! branch on where bytes come from and where they go.

use std::io::Read;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, StageError, StageOutcome};
use crate::types::{DirectInput, ObjectLocation, StageRequest};

/// Raw trigger payload, covering both invocation shapes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TriggerPayload {
    #[serde(rename = "Records")]
    records: Vec<EventRecord>,
    image_data: Option<String>,
    s3_bucket: Option<String>,
    s3_key: Option<String>,
    operation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    s3: EventEntity,
}

#[derive(Debug, Deserialize)]
struct EventEntity {
    bucket: EventBucket,
    object: EventObject,
}

#[derive(Debug, Deserialize)]
struct EventBucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EventObject {
    key: String,
}

/// Builds a [`StageRequest`] from a trigger payload.
pub struct PipelineRouter;

impl PipelineRouter {
    /// Detect the invocation mode and build the request.
    ///
    /// Fails with [`StageError::InvalidRequest`] when the payload matches
    /// neither shape, or matches the direct shape ambiguously.
    pub fn route(payload: &Value) -> StageOutcome<StageRequest> {
        if !payload.is_object() {
            return Err(StageError::InvalidRequest(
                "trigger payload must be a JSON object".into(),
            ));
        }
        let trigger = TriggerPayload::deserialize(payload)
            .map_err(|e| StageError::InvalidRequest(format!("malformed trigger payload: {e}")))?;

        if let Some(record) = trigger.records.into_iter().next() {
            let key = decode_object_key(&record.s3.object.key)?;
            return Ok(StageRequest::EventTriggered(ObjectLocation::new(
                record.s3.bucket.name,
                key,
            )));
        }

        let image_data = trigger.image_data.filter(|data| !data.is_empty());
        let bucket = trigger.s3_bucket.filter(|bucket| !bucket.is_empty());
        let key = trigger.s3_key.filter(|key| !key.is_empty());

        let input = match (image_data, bucket, key) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(StageError::InvalidRequest(
                    "provide either 'image_data' or 's3_bucket'/'s3_key', not both".into(),
                ));
            }
            (Some(data), None, None) => {
                let bytes = BASE64.decode(data.trim()).map_err(|e| {
                    StageError::InvalidRequest(format!("'image_data' is not valid base64: {e}"))
                })?;
                DirectInput::Inline(bytes)
            }
            (None, Some(bucket), Some(key)) => {
                DirectInput::Reference(ObjectLocation::new(bucket, key))
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                return Err(StageError::InvalidRequest(
                    "'s3_bucket' and 's3_key' must be given together".into(),
                ));
            }
            (None, None, None) => {
                return Err(StageError::InvalidRequest(
                    "Missing required fields: either 'image_data' or ('s3_bucket' and 's3_key')"
                        .into(),
                ));
            }
        };

        Ok(StageRequest::DirectInvocation {
            input,
            operation: trigger.operation,
        })
    }
}

/// Characters left as-is when encoding a key for a notification.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b' ');

/// Build the storage notification a store emits when `location` is written.
pub fn event_payload(location: &ObjectLocation) -> Value {
    json!({
        "Records": [
            {
                "s3": {
                    "bucket": { "name": location.bucket },
                    "object": { "key": encode_object_key(&location.key) }
                }
            }
        ]
    })
}

/// Encode an object key the way storage notifications carry it.
///
/// Inverse of [`decode_object_key`]: spaces become `+`, and a literal `+` is
/// percent-encoded.
pub fn encode_object_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_ENCODE_SET)
        .to_string()
        .replace(' ', "+")
}

/// Decode an object key from a storage notification.
///
/// Notification keys are URL-encoded with `+` standing for a space, so `+`
/// is replaced before percent-decoding (an encoded plus, `%2B`, survives).
pub fn decode_object_key(raw: &str) -> StageOutcome<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|e| StageError::InvalidRequest(format!("object key is not valid UTF-8: {e}")))
}

/// Parse payload text. Trigger and ingest payloads are both JSON objects.
pub fn parse_payload(text: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(StageError::InvalidRequest("payload must be a JSON object".into()).into());
    }
    Ok(value)
}

/// Read and parse a payload from a file, or from `input` when `path` is `-`
/// or unset.
pub fn read_payload(path: Option<&Path>, mut input: impl Read) -> Result<Value> {
    let text = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)?,
        _ => {
            let mut buffer = String::new();
            input.read_to_string(&mut buffer)?;
            buffer
        }
    };
    parse_payload(&text)
}
