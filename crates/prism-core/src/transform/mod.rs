//! Image transforms applied by the stages.
//!
//! Each stage applies exactly one [`Transform`]: decode, one pixel operation,
//! re-encode as JPEG. The [`ImageTransform`] trait is the seam a stage
//! handler depends on, so tests can substitute their own transform.

pub mod decode;
pub mod ops;

pub use decode::{format_name, DecodedImage, ImageDecoder};
pub use ops::CropRect;

use image::{DynamicImage, GenericImageView};

use crate::config::{LimitsConfig, TransformConfig};
use crate::error::TransformError;
use crate::store::DEFAULT_CONTENT_TYPE;

/// Bytes produced by a transform, plus what telemetry wants to know about them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Encoded output image
    pub bytes: Vec<u8>,
    /// Content type of `bytes`
    pub content_type: String,
    /// Detected input format ("jpeg", "png", ...)
    pub input_format: String,
    /// Input width and height
    pub input_dimensions: (u32, u32),
    /// Output width and height
    pub output_dimensions: (u32, u32),
}

/// A pure bytes-to-bytes image operation.
///
/// Implementations are synchronous and CPU-bound; handlers run them on the
/// blocking pool.
pub trait ImageTransform: Send + Sync {
    /// Operation name for telemetry (e.g., "rotate180").
    fn name(&self) -> &str;

    /// Transform one encoded image. Fails only on undecodable input.
    fn apply(&self, bytes: &[u8]) -> Result<TransformOutput, TransformError>;
}

/// The four pixel operations a stage can perform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Rotate180,
    Resize { factor: f64 },
    CenterZoom { fraction: f64 },
    Greyscale,
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Rotate180 => "rotate180",
            Transform::Resize { .. } => "resize",
            Transform::CenterZoom { .. } => "center_zoom",
            Transform::Greyscale => "greyscale",
        }
    }

    /// Apply the operation to a decoded image.
    pub fn apply_to(&self, image: &DynamicImage) -> Result<DynamicImage, TransformError> {
        match *self {
            Transform::Rotate180 => Ok(ops::rotate180(image)),
            Transform::Resize { factor } => ops::resize(image, factor),
            Transform::CenterZoom { fraction } => Ok(ops::center_zoom(image, fraction)),
            Transform::Greyscale => Ok(ops::greyscale(image)),
        }
    }
}

/// [`ImageTransform`] backed by the `image` codec.
#[derive(Debug, Clone)]
pub struct CodecTransform {
    op: Transform,
    decoder: ImageDecoder,
    jpeg_quality: u8,
}

impl CodecTransform {
    pub fn new(op: Transform, limits: LimitsConfig, config: &TransformConfig) -> Self {
        Self {
            op,
            decoder: ImageDecoder::new(limits),
            jpeg_quality: config.jpeg_quality,
        }
    }

    pub fn op(&self) -> Transform {
        self.op
    }
}

impl ImageTransform for CodecTransform {
    fn name(&self) -> &str {
        self.op.name()
    }

    fn apply(&self, bytes: &[u8]) -> Result<TransformOutput, TransformError> {
        let decoded = self.decoder.decode(bytes)?;
        let output = self.op.apply_to(&decoded.image)?;
        let encoded = ops::encode_jpeg(&output, self.jpeg_quality)?;

        Ok(TransformOutput {
            bytes: encoded,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            input_format: format_name(decoded.format).to_string(),
            input_dimensions: (decoded.width, decoded.height),
            output_dimensions: output.dimensions(),
        })
    }
}
