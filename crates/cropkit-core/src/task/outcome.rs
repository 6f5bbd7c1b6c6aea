//! The terminal result of a crop task.

use crate::buffer::Bitmap;
use crate::decode::Locator;
use crate::error::CropError;

/// What a finished crop task delivers to its observer, at most once.
///
/// A `Cropped` outcome owns its bitmap: whoever ends up holding the outcome
/// releases the pixels by dropping it.
#[derive(Debug)]
pub enum CropOutcome {
    /// The crop, returned to the caller.
    Cropped { bitmap: Bitmap, sample_factor: u32 },
    /// The crop was written to the destination and its buffer released.
    Saved { locator: Locator, sample_factor: u32 },
    /// The task failed. `was_persist_attempt` is true when the request had a
    /// destination, whether or not writing had started.
    Failed {
        error: CropError,
        was_persist_attempt: bool,
    },
}

impl CropOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, CropOutcome::Failed { .. })
    }

    /// Sample factor the crop was produced at, for successful outcomes.
    pub fn sample_factor(&self) -> Option<u32> {
        match self {
            CropOutcome::Cropped { sample_factor, .. } | CropOutcome::Saved { sample_factor, .. } => {
                Some(*sample_factor)
            }
            CropOutcome::Failed { .. } => None,
        }
    }

    pub fn bitmap(&self) -> Option<&Bitmap> {
        match self {
            CropOutcome::Cropped { bitmap, .. } => Some(bitmap),
            _ => None,
        }
    }

    pub fn into_bitmap(self) -> Option<Bitmap> {
        match self {
            CropOutcome::Cropped { bitmap, .. } => Some(bitmap),
            _ => None,
        }
    }

    pub fn locator(&self) -> Option<&Locator> {
        match self {
            CropOutcome::Saved { locator, .. } => Some(locator),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&CropError> {
        match self {
            CropOutcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}
