//! Cropkit Core - Cancellable image crop tasks
//!
//! This crate crops, rotates, flips and resizes RGB images on a background
//! runtime, optionally writes the result to a file, and delivers the outcome
//! to an observer on a caller-chosen completion context. Every pixel buffer
//! is accounted against a [`MemoryBudget`], and a task that runs out of
//! memory retries at a coarser sampling before giving up.

pub mod buffer;
pub mod config;
pub mod decode;
pub mod error;
pub mod persist;
pub mod resize;
pub mod task;
pub mod transform;

pub use buffer::{Bitmap, MemoryBudget};
pub use config::CropConfig;
pub use decode::{Locator, StoredImage};
pub use error::CropError;
pub use persist::{Destination, Encoding};
pub use resize::{FilterType, SizingPolicy, TargetBounds};
pub use task::{
    CompletionContext, CropHandle, CropObserver, CropOutcome, CropRequest, CropTask,
    DeliveryPump, DeliveryQueue, ObserverHandle, Stages,
};
pub use transform::{AspectRatio, CropGeometry, InterpolationFilter};
