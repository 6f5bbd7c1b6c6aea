//! Scaling the transformed crop to the requested bounds.

mod scale;

pub use scale::{calculate_target_dimensions, downsample, resize_exact};

use serde::{Deserialize, Serialize};

use crate::buffer::{Bitmap, MemoryBudget};
use crate::config::CropConfig;
use crate::error::CropError;

/// Interpolation filter for resize operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    /// Nearest neighbor interpolation (fastest, lowest quality).
    Nearest,
    /// Bilinear interpolation (fast, acceptable quality).
    #[default]
    Bilinear,
    /// Lanczos3 interpolation (slower, highest quality).
    Lanczos3,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Nearest => image::imageops::FilterType::Nearest,
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
            FilterType::Lanczos3 => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// How the output size relates to the requested bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizingPolicy {
    /// Keep whatever size the crop produced.
    #[default]
    None,
    /// Only decode-time sampling reduces the size.
    Sample,
    /// Downscale, preserving aspect ratio, to fit inside the bounds.
    Fit,
    /// Scale up or down, preserving aspect ratio, until one side touches the bounds.
    FitExact,
    /// Stretch to exactly the bounds.
    Exact,
}

/// Requested output size. A zero side means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TargetBounds {
    pub width: u32,
    pub height: u32,
}

impl TargetBounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, which disables resizing.
    pub fn is_unbounded(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Scales a buffer to the request bounds.
///
/// Takes the buffer by value: it is either returned as is or released once
/// the scaled copy exists.
pub trait Resizer: Send + Sync {
    fn resize(
        &self,
        image: Bitmap,
        bounds: TargetBounds,
        policy: SizingPolicy,
    ) -> Result<Bitmap, CropError>;
}

/// The default [`Resizer`], using the `image` crate's resampling filters.
#[derive(Debug, Clone)]
pub struct PixelResizer {
    budget: MemoryBudget,
    filter: FilterType,
}

impl PixelResizer {
    pub fn new(budget: MemoryBudget, filter: FilterType) -> Self {
        Self { budget, filter }
    }

    pub fn from_config(config: &CropConfig, budget: MemoryBudget) -> Self {
        Self::new(budget, config.resize_filter)
    }

    pub fn filter(&self) -> FilterType {
        self.filter
    }
}

impl Resizer for PixelResizer {
    fn resize(
        &self,
        image: Bitmap,
        bounds: TargetBounds,
        policy: SizingPolicy,
    ) -> Result<Bitmap, CropError> {
        let Some((width, height)) =
            calculate_target_dimensions(image.width(), image.height(), bounds, policy)
        else {
            return Ok(image);
        };

        tracing::debug!(
            from_width = image.width(),
            from_height = image.height(),
            width,
            height,
            ?policy,
            "Resizing crop"
        );

        resize_exact(&image, width, height, self.filter, &self.budget)
    }
}
