//! Geometric transforms: crop, rotation, flips and aspect constraint.
//!
//! # Transform Order
//!
//! [`PixelTransformer`] applies the steps of a [`CropGeometry`] in this order:
//! 1. Crop to the polygon's bounding rectangle
//! 2. Rotate clockwise (lossless for right angles)
//! 3. For other angles, crop the polygon's bounds inside the rotated canvas
//! 4. Fit the aspect ratio, if one is requested
//! 5. Flip horizontally and/or vertically
//!
//! Every intermediate buffer comes from the [`MemoryBudget`] and is dropped
//! as soon as the next step has produced its output.

mod crop;
mod flip;
mod geometry;
mod rotation;

pub use crop::crop_rect;
pub use flip::{flip_horizontal, flip_vertical};
pub use geometry::{AspectRatio, CropGeometry, PixelRect, Point};
pub use rotation::{
    compute_rotated_bounds, rotate, rotate_point, rotate_quarter_turns, rotated_polygon_rect,
    InterpolationFilter,
};

use crate::buffer::{Bitmap, MemoryBudget};
use crate::config::CropConfig;
use crate::error::CropError;

/// Applies crop geometry to a decoded buffer.
///
/// The input is borrowed so the caller can retry with a smaller copy after
/// an out-of-memory failure.
pub trait Transformer: Send + Sync {
    fn apply(
        &self,
        source: &Bitmap,
        geometry: &CropGeometry,
        aspect: Option<AspectRatio>,
    ) -> Result<Bitmap, CropError>;
}

/// The default [`Transformer`], working directly on RGB pixels.
#[derive(Debug, Clone)]
pub struct PixelTransformer {
    budget: MemoryBudget,
    filter: InterpolationFilter,
}

impl PixelTransformer {
    pub fn new(budget: MemoryBudget, filter: InterpolationFilter) -> Self {
        Self { budget, filter }
    }

    pub fn from_config(config: &CropConfig, budget: MemoryBudget) -> Self {
        Self::new(budget, config.rotation_filter)
    }
}

impl Transformer for PixelTransformer {
    fn apply(
        &self,
        source: &Bitmap,
        geometry: &CropGeometry,
        aspect: Option<AspectRatio>,
    ) -> Result<Bitmap, CropError> {
        if let Some(aspect) = aspect {
            aspect.validate()?;
        }
        let rect = geometry.pixel_rect(source.width(), source.height())?;
        let cropped = crop_rect(source, rect, &self.budget)?;

        let rotation = geometry.rotation();
        let (rotated, inner) = if geometry.is_right_angle() {
            let rotated = if rotation == 0 {
                cropped
            } else {
                let turned = rotate_quarter_turns(&cropped, (rotation / 90) as u8, &self.budget)?;
                drop(cropped);
                turned
            };
            let inner = PixelRect::full(rotated.width(), rotated.height());
            (rotated, inner)
        } else {
            let angle = f64::from(rotation);
            let rotated = rotate(&cropped, angle, self.filter, &self.budget)?;
            let local = geometry.translated(f64::from(rect.left), f64::from(rect.top));
            let inner = rotated_polygon_rect(
                local.points(),
                cropped.dimensions(),
                rotated.dimensions(),
                angle,
            )?;
            drop(cropped);
            (rotated, inner)
        };

        let target = match aspect {
            Some(aspect) => aspect.fit(inner)?,
            None => inner,
        };

        let mut output = if target.is_full(rotated.width(), rotated.height()) {
            rotated
        } else {
            crop_rect(&rotated, target, &self.budget)?
        };

        if geometry.flip_horizontal() {
            flip_horizontal(&mut output);
        }
        if geometry.flip_vertical() {
            flip_vertical(&mut output);
        }

        tracing::debug!(
            source_width = source.width(),
            source_height = source.height(),
            rotation,
            output_width = output.width(),
            output_height = output.height(),
            "Transformed crop"
        );

        Ok(output)
    }
}
