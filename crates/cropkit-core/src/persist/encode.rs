//! JPEG and PNG encoding of crop output.
//!
//! Both encoders come from the `image` crate and take raw RGB8 rows.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use thiserror::Error;

use super::Encoding;
use crate::error::CropError;

/// Errors that can occur while encoding a crop.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 3), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// The codec rejected the image
    #[error("{encoding:?} encoding failed: {message}")]
    EncodingFailed { encoding: Encoding, message: String },
}

impl From<EncodeError> for CropError {
    fn from(err: EncodeError) -> Self {
        CropError::Persist(err.to_string())
    }
}

/// Encode RGB pixel data with the given encoding.
///
/// `quality` only applies to JPEG and is clamped to 1-100.
pub fn encode(
    pixels: &[u8],
    width: u32,
    height: u32,
    encoding: Encoding,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    validate(pixels, width, height)?;

    let mut buffer = Cursor::new(Vec::new());
    let written = match encoding {
        Encoding::Jpeg => JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .write_image(pixels, width, height, ExtendedColorType::Rgb8),
        Encoding::Png => {
            PngEncoder::new(&mut buffer).write_image(pixels, width, height, ExtendedColorType::Rgb8)
        }
    };
    written.map_err(|e| EncodeError::EncodingFailed {
        encoding,
        message: e.to_string(),
    })?;

    Ok(buffer.into_inner())
}

/// Encode RGB pixel data to JPEG bytes.
///
/// # Quality Guidelines
///
/// * 90-100: High quality, suitable for archival or further editing
/// * 60-90: Good quality for most uses
/// * Below 60: Low quality, visible artifacts
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    encode(pixels, width, height, Encoding::Jpeg, quality)
}

/// Encode RGB pixel data to lossless PNG bytes.
pub fn encode_png(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, EncodeError> {
    encode(pixels, width, height, Encoding::Png, 100)
}

fn validate(pixels: &[u8], width: u32, height: u32) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected_len = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: pixels.len(),
        });
    }
    Ok(())
}


// ============================================================================
// Property-Based Tests
// ============================================================================
