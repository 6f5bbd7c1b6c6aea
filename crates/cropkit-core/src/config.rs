//! Tunables for the crop pipeline.
//!
//! `CropConfig` is plain data so hosts can load it from whatever settings
//! format they already use. Every field has a default, and missing fields
//! fall back to it during deserialization.

use serde::{Deserialize, Serialize};

use crate::resize::FilterType;
use crate::transform::InterpolationFilter;

/// Configuration shared by the default stages and the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CropConfig {
    /// Upper bound on bytes held by image buffers at once. `None` means unbounded.
    pub memory_limit_bytes: Option<u64>,
    /// Retry decode and transform at a lower resolution after running out of memory.
    pub retry_on_oom: bool,
    /// Largest sample factor a retry may reach before the failure is reported.
    pub max_retry_sample_factor: u32,
    /// Interpolation used for rotations that are not a multiple of 90 degrees.
    pub rotation_filter: InterpolationFilter,
    /// Filter used when scaling to the target bounds.
    pub resize_filter: FilterType,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            memory_limit_bytes: None,
            retry_on_oom: true,
            max_retry_sample_factor: 16,
            rotation_filter: InterpolationFilter::Bilinear,
            resize_filter: FilterType::Bilinear,
        }
    }
}

impl CropConfig {
    /// Retry ceiling rounded up to a power of two, never below 1.
    pub fn retry_ceiling(&self) -> u32 {
        if !self.retry_on_oom {
            return 1;
        }
        self.max_retry_sample_factor.max(1).next_power_of_two()
    }
}
