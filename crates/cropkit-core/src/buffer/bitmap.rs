//! The owned pixel buffer passed between pipeline stages.

use std::fmt;

use image::{ImageBuffer, Rgb, RgbImage};

use super::Lease;
use crate::error::CropError;

/// A decoded image with RGB pixel data.
///
/// A bitmap is move-only: stages hand it on by value or borrow it, and
/// dropping it is the release. Bitmaps created through a
/// [`MemoryBudget`](super::MemoryBudget) carry a lease that returns their
/// bytes to the budget on drop.
pub struct Bitmap {
    width: u32,
    height: u32,
    /// RGB pixel data in row-major order (3 bytes per pixel).
    pixels: Vec<u8>,
    lease: Option<Lease>,
}

impl Bitmap {
    /// Bytes per pixel.
    pub const CHANNELS: usize = 3;

    /// Create an untracked bitmap from raw RGB pixels.
    ///
    /// Fails when `pixels` does not hold exactly `width * height * 3` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, CropError> {
        if Some(pixels.len()) != Self::byte_len(width, height) {
            return Err(CropError::Internal(format!(
                "pixel buffer of {} bytes does not match {width}x{height} RGB",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
            lease: None,
        })
    }

    pub(super) fn leased(width: u32, height: u32, pixels: Vec<u8>, lease: Lease) -> Self {
        Self {
            width,
            height,
            pixels,
            lease: Some(lease),
        }
    }

    /// Create an untracked bitmap from an `image::RgbImage`.
    pub fn from_rgb_image(img: RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
            lease: None,
        }
    }

    /// Copy into an `image::RgbImage`.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Borrow the pixels as an `image` buffer without copying.
    pub fn as_view(&self) -> Option<ImageBuffer<Rgb<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.pixels.as_slice())
    }

    /// Buffer length for an RGB image of the given size, or `None` on overflow.
    pub fn byte_len(width: u32, height: u32) -> Option<usize> {
        (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::CHANNELS)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Get the size of the pixel buffer in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }

    /// Check if this is an empty/invalid image.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Whether this buffer is charged to a memory budget.
    pub fn is_tracked(&self) -> bool {
        self.lease.is_some()
    }

    /// RGB value at `(x, y)`. Caller guarantees the coordinates are in bounds.
    #[inline]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    /// Release the buffer now.
    pub fn release(self) {
        drop(self);
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("tracked", &self.is_tracked())
            .finish()
    }
}
