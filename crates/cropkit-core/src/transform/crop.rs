//! Rectangular pixel crops.
//!
//! The crop region is a [`PixelRect`] already clamped to the source, usually
//! produced by [`CropGeometry::pixel_rect`](super::CropGeometry::pixel_rect).
//! The output buffer is charged to the given memory budget.

use super::PixelRect;
use crate::buffer::{Bitmap, MemoryBudget};
use crate::error::CropError;

/// Copy `rect` out of `image` into a new bitmap.
///
/// # Errors
///
/// - `Transform` if the rectangle is empty or extends beyond the image
/// - `OutOfMemory` if the budget cannot hold the output
pub fn crop_rect(
    image: &Bitmap,
    rect: PixelRect,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    if rect.width == 0 || rect.height == 0 {
        return Err(CropError::Transform("empty crop rectangle".to_string()));
    }
    if rect.right() > image.width() || rect.bottom() > image.height() {
        return Err(CropError::Transform(format!(
            "crop rectangle {}x{}+{}+{} exceeds {}x{} image",
            rect.width,
            rect.height,
            rect.left,
            rect.top,
            image.width(),
            image.height()
        )));
    }

    let mut output = budget.allocate(rect.width, rect.height)?;

    let channels = Bitmap::CHANNELS;
    let src_stride = image.width() as usize * channels;
    let dst_stride = rect.width as usize * channels;
    let src = image.pixels();
    let dst = output.pixels_mut();

    // Copy pixel data row by row
    for y in 0..rect.height as usize {
        let src_start = (rect.top as usize + y) * src_stride + rect.left as usize * channels;
        let dst_start = y * dst_stride;
        dst[dst_start..dst_start + dst_stride]
            .copy_from_slice(&src[src_start..src_start + dst_stride]);
    }

    Ok(output)
}


// ============================================================================
// Property-Based Tests
// ============================================================================
