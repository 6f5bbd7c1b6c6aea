//! Writing finished crops to storage.

mod encode;

pub use encode::{encode, encode_jpeg, encode_png, EncodeError};

use serde::{Deserialize, Serialize};

use crate::buffer::Bitmap;
use crate::decode::Locator;
use crate::error::CropError;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    Jpeg,
    Png,
}

/// Where and how to persist a crop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub locator: Locator,
    pub encoding: Encoding,
    /// Encoder quality, 0-100. Ignored by lossless encodings.
    pub quality: u8,
}

impl Destination {
    /// Quality is clamped to 100.
    pub fn new(locator: impl Into<Locator>, encoding: Encoding, quality: u8) -> Self {
        Self {
            locator: locator.into(),
            encoding,
            quality: quality.min(100),
        }
    }
}

/// Writes a bitmap to a destination.
///
/// The bitmap is only borrowed; the caller releases it whatever the result.
pub trait PersistSink: Send + Sync {
    fn write(&self, image: &Bitmap, destination: &Destination) -> Result<(), CropError>;
}

/// The default [`PersistSink`]: encodes in memory and writes the bytes to
/// the locator as a file path.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl FileSink {
    pub fn new() -> Self {
        Self
    }
}

impl PersistSink for FileSink {
    fn write(&self, image: &Bitmap, destination: &Destination) -> Result<(), CropError> {
        let bytes = encode(
            image.pixels(),
            image.width(),
            image.height(),
            destination.encoding,
            destination.quality,
        )?;

        std::fs::write(destination.locator.as_path(), &bytes)
            .map_err(|e| CropError::Persist(format!("{}: {e}", destination.locator)))?;

        tracing::debug!(
            locator = %destination.locator,
            encoding = ?destination.encoding,
            bytes = bytes.len(),
            "Persisted crop"
        );
        Ok(())
    }
}
