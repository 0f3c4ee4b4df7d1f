//! Image pre-processing for uploads.
//!
//! The service rejects large or transparent uploads on several endpoints, so every
//! byte-backed input goes through [`preprocess`] before it is base64-encoded:
//! decode, flatten alpha onto white, cap the long side, then re-encode as JPEG with
//! decreasing quality until the output fits the size ceiling or the floor quality is hit.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};

use crate::config::PreprocessConfig;
use crate::error::{GenerationError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG quality the bytes were written with; `None` when the input was passed through.
    pub quality: Option<u8>,
    pub mime: &'static str,
}

impl PreparedImage {
    pub fn to_data_uri(&self) -> String {
        data_uri(self.mime, &self.bytes)
    }
}

/// Decode, flatten, downscale and recompress `bytes`.
///
/// The size ceiling is best effort: once the floor quality is reached the result is
/// returned even if it is still larger than `config.target_bytes`.
pub fn preprocess(bytes: &[u8], config: &PreprocessConfig) -> Result<PreparedImage> {
    let decoded = image::load_from_memory(bytes).map_err(|e| {
        GenerationError::ValidationError(format!("Uploaded file is not a readable image: {}", e))
    })?;
    let (original_width, original_height) = decoded.dimensions();

    let mut rgb = flatten_onto_white(&decoded);

    let max_dimension = config.max_dimension.max(1);
    if rgb.width().max(rgb.height()) > max_dimension {
        let resized = DynamicImage::ImageRgb8(rgb).resize(
            max_dimension,
            max_dimension,
            FilterType::Lanczos3,
        );
        log::info!(
            "Resizing upload from {}x{} to {}x{}",
            original_width,
            original_height,
            resized.width(),
            resized.height()
        );
        rgb = resized.to_rgb8();
    }

    let floor = config.floor_quality.clamp(1, 100);
    let step = config.quality_step.max(1);
    let mut quality = config.start_quality.clamp(floor, 100);

    let encoded = loop {
        let encoded = encode_jpeg(&rgb, quality)?;
        if encoded.len() <= config.target_bytes || quality == floor {
            break encoded;
        }
        let next = quality.saturating_sub(step).max(floor);
        log::debug!(
            "Encoded upload is {} bytes at quality {}, retrying at {}",
            encoded.len(),
            quality,
            next
        );
        quality = next;
    };

    log::info!(
        "Compressed upload {} -> {} bytes ({}x{}, quality {})",
        bytes.len(),
        encoded.len(),
        rgb.width(),
        rgb.height(),
        quality
    );

    Ok(PreparedImage {
        bytes: encoded,
        width: rgb.width(),
        height: rgb.height(),
        quality: Some(quality),
        mime: "image/jpeg",
    })
}

/// Wrap bytes that must not be re-encoded (masks, or uploads when pre-processing is off).
pub fn passthrough(bytes: Vec<u8>) -> PreparedImage {
    let (width, height) = image::load_from_memory(&bytes)
        .map(|img| img.dimensions())
        .unwrap_or((0, 0));
    PreparedImage {
        mime: sniff_mime(&bytes),
        bytes,
        width,
        height,
        quality: None,
    }
}

/// MIME type of an encoded image, `image/png` when the format is not recognised.
pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => "image/png",
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }

    let rgba = image.to_rgba8();
    let mut flattened = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |channel: u8| -> u8 {
            ((u32::from(channel) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        flattened.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    flattened
}

fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(image)
        .map_err(|e| {
            GenerationError::ValidationError(format!("Failed to encode image as JPEG: {}", e))
        })?;
    Ok(buffer)
}
