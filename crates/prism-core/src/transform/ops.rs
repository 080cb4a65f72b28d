//! Pixel-level operations behind each stage, plus JPEG re-encoding.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use std::borrow::Cow;

use crate::error::TransformError;

/// A rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Point-reflect the image through its centre.
pub fn rotate180(image: &DynamicImage) -> DynamicImage {
    image.rotate180()
}

/// Target dimensions for a resize: each side scaled and truncated.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |side: u32| (f64::from(side) * factor).floor() as u32;
    (scale(width), scale(height))
}

/// Scale both dimensions by `factor` with a bilinear kernel.
pub fn resize(image: &DynamicImage, factor: f64) -> Result<DynamicImage, TransformError> {
    let (width, height) = scaled_dimensions(image.width(), image.height(), factor);
    if width == 0 || height == 0 {
        return Err(TransformError::EmptyOutput { width, height });
    }
    Ok(image.resize_exact(width, height, FilterType::Triangle))
}

/// The centred crop kept by [`center_zoom`].
///
/// Crop sides are `round(side * fraction)`, offsets `round((side - crop) / 2)`.
pub fn zoom_crop(width: u32, height: u32, fraction: f64) -> CropRect {
    let crop_side = |side: u32| ((f64::from(side) * fraction).round() as u32).clamp(1, side.max(1));
    let offset = |side: u32, crop: u32| (f64::from(side.saturating_sub(crop)) / 2.0).round() as u32;

    let crop_width = crop_side(width);
    let crop_height = crop_side(height);
    CropRect {
        left: offset(width, crop_width),
        top: offset(height, crop_height),
        width: crop_width,
        height: crop_height,
    }
}

/// Magnify the centre: crop by `fraction`, then scale back to the original size.
pub fn center_zoom(image: &DynamicImage, fraction: f64) -> DynamicImage {
    let (width, height) = image.dimensions();
    let rect = zoom_crop(width, height, fraction);
    image
        .crop_imm(rect.left, rect.top, rect.width, rect.height)
        .resize_exact(width, height, FilterType::Triangle)
}

/// Desaturate to a single luminance channel.
pub fn greyscale(image: &DynamicImage) -> DynamicImage {
    DynamicImage::ImageLuma8(image.to_luma8())
}

/// Encode as baseline JPEG.
///
/// JPEG has no alpha or 16-bit support, so other layouts are reduced to
/// 8-bit luma or RGB first.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, TransformError> {
    let normalized = match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(image),
        other if !other.color().has_color() => Cow::Owned(DynamicImage::ImageLuma8(other.to_luma8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    };

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    normalized
        .write_with_encoder(encoder)
        .map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(buffer)
}
