//! Sampled decoding of stored images.
//!
//! A crop rarely needs the stored image at full resolution: only the region
//! under the crop polygon is kept, and it is sampled down by a power of two
//! so it is not much larger than the requested output.
//!
//! # Examples
//!
//! ```ignore
//! use cropkit_core::decode::{DecodeHint, FileDecoder, SampledDecoder, StoredImage};
//!
//! let stored = StoredImage::new("photo.jpg", 4000, 3000);
//! let hint = DecodeHint::new(None, TargetBounds::new(800, 600));
//! let sampled = FileDecoder::new(MemoryBudget::unbounded()).decode(&stored, &hint)?;
//! println!("Decoded at 1/{}", sampled.sample_factor);
//! ```

mod file;
mod sampling;
mod types;

pub use file::FileDecoder;
pub use sampling::{calculate_sample_factor, sample_region, sampled_dimensions};
pub use types::{DecodeHint, Locator, Sampled, StoredImage};

use crate::error::CropError;

/// Decodes a stored image at reduced resolution.
///
/// Implementations report the sample factor they used and the full-resolution
/// origin of the decoded region, so the caller can map crop geometry into
/// the sampled buffer.
pub trait SampledDecoder: Send + Sync {
    fn decode(&self, image: &StoredImage, hint: &DecodeHint) -> Result<Sampled, CropError>;
}
