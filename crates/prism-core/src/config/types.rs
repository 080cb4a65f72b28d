//! Sub-configuration structs with defaults matching the deployed pipeline.

use crate::stage::StageKind;
use serde::{Deserialize, Serialize};

/// Object store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the filesystem store; each bucket is a subdirectory
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "~/.prism/store".to_string(),
        }
    }
}

/// Addressing for a single stage.
///
/// Unset fields fall back to the stage's built-in defaults, so a table that
/// only overrides `output_bucket` keeps the standard prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Key prefix this stage listens on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_prefix: Option<String>,

    /// Key prefix the stage writes its output under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_prefix: Option<String>,

    /// Destination bucket; empty or unset writes back to the source bucket
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_bucket: Option<String>,

    /// Copy the source object's content type onto the output object
    pub preserve_content_type: bool,
}

impl StageConfig {
    /// Fully populated config for a stage kind.
    pub fn defaults_for(kind: StageKind) -> Self {
        Self {
            input_prefix: Some(kind.default_input_prefix().to_string()),
            output_prefix: Some(kind.default_output_prefix().to_string()),
            output_bucket: None,
            preserve_content_type: false,
        }
    }
}

/// Per-stage addressing for every stage kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagesConfig {
    pub rotate: StageConfig,
    pub resize: StageConfig,
    pub zoom: StageConfig,
    pub greyscale: StageConfig,
}

impl Default for StagesConfig {
    fn default() -> Self {
        Self {
            rotate: StageConfig::defaults_for(StageKind::Rotate),
            resize: StageConfig::defaults_for(StageKind::Resize),
            zoom: StageConfig::defaults_for(StageKind::Zoom),
            greyscale: StageConfig::defaults_for(StageKind::Greyscale),
        }
    }
}

impl StagesConfig {
    /// Config table for a stage kind.
    pub fn get(&self, kind: StageKind) -> &StageConfig {
        match kind {
            StageKind::Rotate => &self.rotate,
            StageKind::Resize => &self.resize,
            StageKind::Zoom => &self.zoom,
            StageKind::Greyscale => &self.greyscale,
        }
    }
}

/// Transform parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Scale factor applied by the resize stage
    pub resize_factor: f64,

    /// Fraction of each dimension kept by the zoom stage's centre crop
    pub zoom_fraction: f64,

    /// JPEG quality for re-encoded output (1-100)
    pub jpeg_quality: u8,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            resize_factor: 1.5,
            zoom_fraction: 0.5,
            jpeg_quality: 90,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum input object size in megabytes
    pub max_input_mb: u64,

    /// Maximum decoded image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_mb: 50,
            max_image_dimension: 20000,
        }
    }
}

/// Chained pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stages wired together by prefix, in trigger order
    pub chain: Vec<StageKind>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chain: vec![StageKind::Rotate, StageKind::Resize, StageKind::Greyscale],
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON results
    pub pretty: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
