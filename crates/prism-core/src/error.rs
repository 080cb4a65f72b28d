//! Error types for the Prism stage pipeline.
//!
//! Errors are organized by collaborator (store, transform) so a failed
//! invocation can report both a readable message and a stable error kind.

use thiserror::Error;

/// Top-level error type for Prism operations outside a stage invocation.
#[derive(Error, Debug)]
pub enum PrismError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Stage construction or routing errors
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failures reported by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No object exists at the address
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The store refused the operation
    #[error("Access denied for {bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Transient or unclassified I/O failure
    #[error("I/O error for {bucket}/{key}: {message}")]
    Io {
        bucket: String,
        key: String,
        message: String,
    },
}

/// Failures while decoding, transforming or re-encoding an image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Bytes could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The image format could not be detected
    #[error("Unsupported image format")]
    UnsupportedFormat,

    /// Input exceeds the configured byte limit
    #[error("Input too large: {size_mb}MB > {max_mb}MB")]
    InputTooLarge { size_mb: u64, max_mb: u64 },

    /// Decoded dimensions exceed the configured limit
    #[error("Image too large: {width}x{height} > {max_dim}")]
    ImageTooLarge { width: u32, height: u32, max_dim: u32 },

    /// The transform would produce an image with no pixels
    #[error("Transform leaves an empty {width}x{height} image")]
    EmptyOutput { width: u32, height: u32 },

    /// Re-encoding the output failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// The blocking worker running the transform did not complete
    #[error("Transform task failed: {0}")]
    Task(String),
}

/// Every way a single stage invocation can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The trigger payload is missing or has conflicting addressing fields
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Object store read or write failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Image could not be transformed
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl StageError {
    /// Stable label for the error class, reported as the `error_kind` attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvalidRequest(_) => "InvalidRequest",
            StageError::Store(StoreError::NotFound { .. }) => "NotFound",
            StageError::Store(StoreError::AccessDenied { .. }) => "AccessDenied",
            StageError::Store(StoreError::Io { .. }) => "IOError",
            StageError::Transform(_) => "TransformError",
        }
    }
}

/// Convenience type alias for Prism results.
pub type Result<T> = std::result::Result<T, PrismError>;

/// Convenience type alias for stage-level results.
pub type StageOutcome<T> = std::result::Result<T, StageError>;
