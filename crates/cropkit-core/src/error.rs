//! Error type shared by every pipeline stage.

use thiserror::Error;

/// Errors surfaced by a crop task.
///
/// Every stage reports through this one enum so the task can fold any failure
/// into a single [`CropOutcome::Failed`](crate::CropOutcome::Failed).
#[derive(Debug, Error)]
pub enum CropError {
    /// The request carried neither an in-memory bitmap nor a stored reference.
    #[error("Crop request has no image source")]
    NoSource,

    /// The stored image could not be read or decoded.
    #[error("Failed to decode source image: {0}")]
    Decode(String),

    /// The crop geometry is unusable for this image.
    #[error("Invalid crop geometry: {0}")]
    Transform(String),

    /// A buffer could not be allocated within the memory budget.
    #[error("Out of memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },

    /// Writing the result to its destination failed.
    #[error("Failed to persist cropped image: {0}")]
    Persist(String),

    /// A stage implementation panicked.
    #[error("Crop stage aborted: {0}")]
    Internal(String),
}

impl CropError {
    /// True for allocation failures, which the task may retry at a lower resolution.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, CropError::OutOfMemory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CropError::Decode("truncated JPEG".to_string());
        assert_eq!(err.to_string(), "Failed to decode source image: truncated JPEG");

        let err = CropError::OutOfMemory {
            requested: 300,
            available: 100,
        };
        assert_eq!(
            err.to_string(),
            "Out of memory: requested 300 bytes, 100 available"
        );
    }

    #[test]
    fn test_is_out_of_memory() {
        assert!(CropError::OutOfMemory {
            requested: 1,
            available: 0
        }
        .is_out_of_memory());
        assert!(!CropError::NoSource.is_out_of_memory());
        assert!(!CropError::Persist("disk full".into()).is_out_of_memory());
    }
}
