//! The catalogue of pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::TransformConfig;
use crate::error::ConfigError;
use crate::transform::Transform;

/// A pipeline stage. Resize and zoom are alternative second stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Rotate,
    Resize,
    Zoom,
    Greyscale,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::Rotate,
        StageKind::Resize,
        StageKind::Zoom,
        StageKind::Greyscale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::Rotate => "rotate",
            StageKind::Resize => "resize",
            StageKind::Zoom => "zoom",
            StageKind::Greyscale => "greyscale",
        }
    }

    /// Prefix the stage listens on in the standard layout.
    pub fn default_input_prefix(&self) -> &'static str {
        match self {
            StageKind::Rotate => "input/",
            StageKind::Resize | StageKind::Zoom => "stage1/",
            StageKind::Greyscale => "stage2/",
        }
    }

    /// Prefix the stage writes to in the standard layout.
    pub fn default_output_prefix(&self) -> &'static str {
        match self {
            StageKind::Rotate => "stage1/",
            StageKind::Resize | StageKind::Zoom => "stage2/",
            StageKind::Greyscale => "output/",
        }
    }

    /// The transform this stage applies.
    pub fn transform(&self, config: &TransformConfig) -> Transform {
        match self {
            StageKind::Rotate => Transform::Rotate180,
            StageKind::Resize => Transform::Resize {
                factor: config.resize_factor,
            },
            StageKind::Zoom => Transform::CenterZoom {
                fraction: config.zoom_fraction,
            },
            StageKind::Greyscale => Transform::Greyscale,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rotate" => Ok(StageKind::Rotate),
            "resize" => Ok(StageKind::Resize),
            "zoom" => Ok(StageKind::Zoom),
            "greyscale" | "grayscale" => Ok(StageKind::Greyscale),
            other => Err(ConfigError::ValidationError(format!(
                "unknown stage '{other}' (expected rotate, resize, zoom or greyscale)"
            ))),
        }
    }
}
