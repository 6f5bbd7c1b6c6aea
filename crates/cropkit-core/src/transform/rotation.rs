//! Image rotation: exact quarter turns and interpolated arbitrary angles.
//!
//! Multiples of 90 degrees are lossless pixel remaps. Every other angle uses
//! inverse mapping: for each pixel in the output image we calculate which
//! source pixel(s) contribute to it and interpolate their values, with one of
//! two filters:
//! - **Bilinear**: fast, the default
//! - **Lanczos3**: sharper, about 9x the work per pixel
//!
//! For a clockwise rotation by angle θ (y axis pointing down) the inverse
//! transform is:
//! ```text
//! src_x = (dst_x - cx) * cos(-θ) - (dst_y - cy) * sin(-θ) + src_cx
//! src_y = (dst_x - cx) * sin(-θ) + (dst_y - cy) * cos(-θ) + src_cy
//! ```

use serde::{Deserialize, Serialize};

use super::{PixelRect, Point};
use crate::buffer::{Bitmap, MemoryBudget};
use crate::error::CropError;

/// Interpolation filter for rotation operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationFilter {
    /// Fast bilinear interpolation.
    #[default]
    Bilinear,
    /// High-quality Lanczos3 interpolation.
    Lanczos3,
}

/// Compute the dimensions of the bounding box for a rotated image.
///
/// When an image is rotated, the corners extend beyond the original bounds.
/// This function calculates the minimum bounding box that contains the
/// entire rotated image.
pub fn compute_rotated_bounds(width: u32, height: u32, angle_degrees: f64) -> (u32, u32) {
    // Normalize angle to handle 360, 720, etc.
    let angle_normalized = angle_degrees % 360.0;

    // Fast path: no rotation needed (including near-zero and multiples of 360)
    if angle_normalized.abs() < 0.001 || (360.0 - angle_normalized.abs()).abs() < 0.001 {
        return (width, height);
    }

    // Fast path: exact 90/270 degree rotations (swap dimensions)
    let abs_angle = angle_normalized.abs();
    if (abs_angle - 90.0).abs() < 0.001 || (abs_angle - 270.0).abs() < 0.001 {
        return (height, width);
    }

    // Fast path: exact 180 degree rotation (same dimensions)
    if (abs_angle - 180.0).abs() < 0.001 {
        return (width, height);
    }

    let angle_rad = angle_degrees.to_radians();
    let cos = angle_rad.cos().abs();
    let sin = angle_rad.sin().abs();

    let w = width as f64;
    let h = height as f64;

    // new_w = |w*cos| + |h*sin|, new_h = |w*sin| + |h*cos|
    let new_w = (w * cos + h * sin).round() as u32;
    let new_h = (w * sin + h * cos).round() as u32;

    (new_w.max(1), new_h.max(1))
}

/// Map a point of a `src_w` x `src_h` image into the canvas produced by
/// rotating it clockwise by `angle_degrees` around its center.
pub fn rotate_point(
    point: Point,
    (src_w, src_h): (u32, u32),
    (dst_w, dst_h): (u32, u32),
    angle_degrees: f64,
) -> Point {
    let angle_rad = angle_degrees.to_radians();
    let (sin, cos) = angle_rad.sin_cos();

    let dx = point.x - src_w as f64 / 2.0;
    let dy = point.y - src_h as f64 / 2.0;

    Point::new(
        dx * cos - dy * sin + dst_w as f64 / 2.0,
        dx * sin + dy * cos + dst_h as f64 / 2.0,
    )
}

/// Rotate clockwise by a whole number of quarter turns, without resampling.
pub fn rotate_quarter_turns(
    image: &Bitmap,
    turns: u8,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    let (w, h) = image.dimensions();
    let turns = turns % 4;
    let (dst_w, dst_h) = if turns % 2 == 1 { (h, w) } else { (w, h) };

    let mut output = budget.allocate(dst_w, dst_h)?;
    let dst = output.pixels_mut();

    for dst_y in 0..dst_h {
        for dst_x in 0..dst_w {
            let (src_x, src_y) = match turns {
                0 => (dst_x, dst_y),
                1 => (dst_y, h - 1 - dst_x),
                2 => (w - 1 - dst_x, h - 1 - dst_y),
                _ => (w - 1 - dst_y, dst_x),
            };
            let dst_idx = ((dst_y as usize * dst_w as usize) + dst_x as usize) * Bitmap::CHANNELS;
            dst[dst_idx..dst_idx + 3].copy_from_slice(&image.pixel(src_x, src_y));
        }
    }

    Ok(output)
}

/// Rotate clockwise by an arbitrary angle.
///
/// The image is rotated around its center and the output canvas is expanded
/// to fit the entire rotated image. Uncovered corners are black.
pub fn rotate(
    image: &Bitmap,
    angle_degrees: f64,
    filter: InterpolationFilter,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    let (src_w, src_h) = (image.width() as f64, image.height() as f64);
    let (dst_w, dst_h) = compute_rotated_bounds(image.width(), image.height(), angle_degrees);

    let mut output = budget.allocate(dst_w, dst_h)?;

    // Inverse rotation maps destination pixels back into the source
    let angle_rad = -angle_degrees.to_radians();
    let cos = angle_rad.cos();
    let sin = angle_rad.sin();

    // Center of source and destination images
    let src_cx = src_w / 2.0;
    let src_cy = src_h / 2.0;
    let dst_cx = dst_w as f64 / 2.0;
    let dst_cy = dst_h as f64 / 2.0;

    let dst = output.pixels_mut();

    for dst_y in 0..dst_h {
        for dst_x in 0..dst_w {
            let dx = dst_x as f64 - dst_cx;
            let dy = dst_y as f64 - dst_cy;

            let src_x = dx * cos - dy * sin + src_cx;
            let src_y = dx * sin + dy * cos + src_cy;

            let pixel = match filter {
                InterpolationFilter::Bilinear => sample_bilinear(image, src_x, src_y),
                InterpolationFilter::Lanczos3 => sample_lanczos3(image, src_x, src_y),
            };

            let dst_idx = ((dst_y * dst_w + dst_x) * 3) as usize;
            dst[dst_idx..dst_idx + 3].copy_from_slice(&pixel);
        }
    }

    Ok(output)
}

/// Bounding rectangle, in the rotated canvas, of a polygon given in the
/// unrotated image's coordinates.
pub fn rotated_polygon_rect(
    points: &[Point],
    src_dims: (u32, u32),
    dst_dims: (u32, u32),
    angle_degrees: f64,
) -> Result<PixelRect, CropError> {
    let mapped = points
        .iter()
        .map(|&p| rotate_point(p, src_dims, dst_dims, angle_degrees));
    PixelRect::enclosing(mapped, dst_dims.0, dst_dims.1)
}

#[inline]
fn get_pixel_f64(image: &Bitmap, px: u32, py: u32) -> [f64; 3] {
    let [r, g, b] = image.pixel(px, py);
    [r as f64, g as f64, b as f64]
}

/// Sample a pixel using bilinear interpolation.
///
/// Points up to half a pixel outside the image use the edge pixels; further
/// out is black.
fn sample_bilinear(image: &Bitmap, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width() as f64, image.height() as f64);

    if x < -0.5 || y < -0.5 || x > w - 0.5 || y > h - 0.5 {
        return [0, 0, 0];
    }

    let x = x.clamp(0.0, w - 1.0);
    let y = y.clamp(0.0, h - 1.0);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);

    // Fractional distances
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = get_pixel_f64(image, x0, y0);
    let p10 = get_pixel_f64(image, x1, y0);
    let p01 = get_pixel_f64(image, x0, y1);
    let p11 = get_pixel_f64(image, x1, y1);

    let mut result = [0u8; 3];
    for i in 0..3 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }

    result
}

/// Sample a pixel using Lanczos3 interpolation over a 6x6 neighborhood.
fn sample_lanczos3(image: &Bitmap, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width() as i64, image.height() as i64);

    // Fall back to bilinear where the kernel would leave the image
    if x < 2.0 || x >= (w - 3) as f64 || y < 2.0 || y >= (h - 3) as f64 {
        return sample_bilinear(image, x, y);
    }

    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;

    let mut sum = [0.0f64; 3];
    let mut weight_sum = 0.0;

    for ky in -2..=3 {
        for kx in -2..=3 {
            let px = x0 + kx;
            let py = y0 + ky;

            if px >= 0 && px < w && py >= 0 && py < h {
                let dx = x - px as f64;
                let dy = y - py as f64;
                let weight = lanczos_weight(dx, 3.0) * lanczos_weight(dy, 3.0);

                let pixel = get_pixel_f64(image, px as u32, py as u32);
                sum[0] += pixel[0] * weight;
                sum[1] += pixel[1] * weight;
                sum[2] += pixel[2] * weight;
                weight_sum += weight;
            }
        }
    }

    let mut result = [0u8; 3];
    if weight_sum > 0.0 {
        for i in 0..3 {
            result[i] = (sum[i] / weight_sum).clamp(0.0, 255.0).round() as u8;
        }
    }

    result
}

/// Lanczos kernel: `sinc(x) * sinc(x/a)` for `|x| < a`, else 0.
fn lanczos_weight(x: f64, a: f64) -> f64 {
    if x.abs() < f64::EPSILON {
        return 1.0;
    }
    if x.abs() >= a {
        return 0.0;
    }

    let pi_x = std::f64::consts::PI * x;
    let pi_x_a = pi_x / a;

    (a * pi_x.sin() * pi_x_a.sin()) / (pi_x * pi_x)
}
