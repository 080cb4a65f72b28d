//! Image decoding with content-based format detection and input limits.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::config::LimitsConfig;
use crate::error::TransformError;

/// Image decoder with configurable limits.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode an in-memory image, detecting the format from its content.
    ///
    /// Object keys carry no reliable extension, so the format is never
    /// guessed from the name.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, TransformError> {
        let max_bytes = self.limits.max_input_mb.saturating_mul(1024 * 1024);
        if bytes.len() as u64 > max_bytes {
            return Err(TransformError::InputTooLarge {
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_input_mb,
            });
        }

        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TransformError::Decode(format!("Cannot detect image format: {e}")))?;
        let format = reader.format().ok_or(TransformError::UnsupportedFormat)?;

        // Header only: refuse empty or oversized images before allocating pixels.
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| TransformError::Decode(e.to_string()))?;
        if width == 0 || height == 0 {
            return Err(TransformError::Decode(format!(
                "image has no pixels ({width}x{height})"
            )));
        }
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(TransformError::ImageTooLarge {
                width,
                height,
                max_dim,
            });
        }

        let mut limits = image::Limits::default();
        limits.max_image_width = Some(max_dim);
        limits.max_image_height = Some(max_dim);
        let mut reader = image::ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(limits);
        let image = reader
            .decode()
            .map_err(|e| TransformError::Decode(e.to_string()))?;
        let (width, height) = image.dimensions();

        Ok(DecodedImage {
            image,
            format,
            width,
            height,
        })
    }
}

/// Short lowercase name for an image format, as reported in telemetry.
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Ico => "ico",
        ImageFormat::Pnm => "pnm",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}
