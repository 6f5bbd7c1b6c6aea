//! Core types for sampled decoding.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::buffer::Bitmap;
use crate::resize::TargetBounds;
use crate::transform::PixelRect;

/// Opaque reference to a stored image or a persisted crop.
///
/// The default decoder and sink treat it as a filesystem path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for Locator {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

/// A stored image that has to be decoded before cropping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredImage {
    pub locator: Locator,
    /// Full-resolution width the crop geometry refers to.
    pub width: u32,
    /// Full-resolution height the crop geometry refers to.
    pub height: u32,
}

impl StoredImage {
    pub fn new(locator: impl Into<Locator>, width: u32, height: u32) -> Self {
        Self {
            locator: locator.into(),
            width,
            height,
        }
    }
}

/// What the caller is going to do with the decoded pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeHint {
    /// Full-resolution region that will be cropped; `None` for the whole image.
    pub region: Option<PixelRect>,
    /// Final output bounds, used to pick how coarsely to sample.
    pub bounds: TargetBounds,
    /// Lower bound multiplier for the sample factor, raised on OOM retries.
    pub sample_multiplier: u32,
}

impl DecodeHint {
    pub fn new(region: Option<PixelRect>, bounds: TargetBounds) -> Self {
        Self {
            region,
            bounds,
            sample_multiplier: 1,
        }
    }

    pub fn with_sample_multiplier(mut self, multiplier: u32) -> Self {
        self.sample_multiplier = multiplier.max(1);
        self
    }
}

/// A decoded region at reduced resolution.
#[derive(Debug)]
pub struct Sampled {
    pub bitmap: Bitmap,
    /// Ratio between full-resolution and sampled pixels.
    pub sample_factor: u32,
    /// Full-resolution top-left corner of the decoded region.
    pub origin: (u32, u32),
}
