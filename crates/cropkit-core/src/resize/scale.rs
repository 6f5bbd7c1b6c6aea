//! Resize primitives built on the `image` crate's filters.
//!
//! The output buffer is reserved against the memory budget before any pixel
//! work starts, so an oversized target fails fast with `OutOfMemory`.

use super::{FilterType, SizingPolicy, TargetBounds};
use crate::buffer::{Bitmap, MemoryBudget};
use crate::error::CropError;

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// - `Transform` if either target dimension is zero
/// - `OutOfMemory` if the budget cannot hold the output
pub fn resize_exact(
    image: &Bitmap,
    width: u32,
    height: u32,
    filter: FilterType,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    if width == 0 || height == 0 {
        return Err(CropError::Transform(format!(
            "cannot resize to {width}x{height}"
        )));
    }

    let reservation = budget.reserve(width, height)?;

    let view = image
        .as_view()
        .ok_or_else(|| CropError::Internal("pixel buffer does not match dimensions".to_string()))?;

    let resized = image::imageops::resize(&view, width, height, filter.to_image_filter());

    reservation.fill(resized.into_raw())
}

/// Shrink an image by an integer factor, keeping at least one pixel per side.
///
/// Used to retry a crop at lower resolution after running out of memory.
pub fn downsample(
    image: &Bitmap,
    factor: u32,
    filter: FilterType,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    let factor = factor.max(1);
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    resize_exact(image, width, height, filter, budget)
}

/// Output dimensions for resizing a `width` x `height` image under `policy`.
///
/// Returns `None` when the image should pass through unchanged. Scaled sides
/// are truncated, never below one pixel.
pub fn calculate_target_dimensions(
    width: u32,
    height: u32,
    bounds: TargetBounds,
    policy: SizingPolicy,
) -> Option<(u32, u32)> {
    if bounds.is_unbounded() || width == 0 || height == 0 {
        return None;
    }

    let target = match policy {
        SizingPolicy::None | SizingPolicy::Sample => return None,
        SizingPolicy::Exact => (bounds.width, bounds.height),
        SizingPolicy::Fit => {
            if width <= bounds.width && height <= bounds.height {
                return None;
            }
            scale_to_fit(width, height, bounds)
        }
        SizingPolicy::FitExact => scale_to_fit(width, height, bounds),
    };

    (target != (width, height)).then_some(target)
}

/// Scale preserving aspect ratio so one side touches the bounds.
fn scale_to_fit(width: u32, height: u32, bounds: TargetBounds) -> (u32, u32) {
    let scale = f64::max(
        width as f64 / bounds.width as f64,
        height as f64 / bounds.height as f64,
    );

    let new_width = (width as f64 / scale) as u32;
    let new_height = (height as f64 / scale) as u32;
    (new_width.max(1), new_height.max(1))
}


// ============================================================================
// Property-Based Tests
// ============================================================================
