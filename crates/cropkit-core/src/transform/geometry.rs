//! Crop geometry: the polygon, rotation and flips requested for a crop.
//!
//! # Coordinate System
//!
//! - Polygon points are in source pixel coordinates, origin top-left
//! - Rotation is in whole degrees, positive = clockwise, normalised to 0..360
//! - Flips are applied after rotation, in output orientation

use serde::{Deserialize, Serialize};

use crate::error::CropError;

/// A point in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// The rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    /// True if this rectangle covers the whole image.
    pub fn is_full(&self, width: u32, height: u32) -> bool {
        self.left == 0 && self.top == 0 && self.width == width && self.height == height
    }

    /// Bounding rectangle of `points`, rounded and clamped to the image.
    ///
    /// Fails when the clamped rectangle has no area.
    pub fn enclosing<I>(points: I, width: u32, height: u32) -> Result<Self, CropError>
    where
        I: IntoIterator<Item = Point>,
    {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for p in points {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(CropError::Transform(format!(
                    "non-finite crop point ({}, {})",
                    p.x, p.y
                )));
            }
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        let spans = pixel_span(min_x, max_x, width).zip(pixel_span(min_y, max_y, height));
        let Some(((left, right), (top, bottom))) = spans else {
            return Err(CropError::Transform(format!(
                "crop polygon encloses no pixels of the {width}x{height} image"
            )));
        };

        Ok(Self::new(left, top, right - left, bottom - top))
    }
}

/// Pixel range `[start, end)` covered by `min..max` along an axis of `limit` pixels.
///
/// Edges are rounded to the nearest pixel. A positive extent narrower than a
/// pixel, as left by scaling a small crop down, keeps the pixel it falls in.
fn pixel_span(min: f64, max: f64, limit: u32) -> Option<(u32, u32)> {
    let bound = f64::from(limit);
    let start = min.round().clamp(0.0, bound) as u32;
    let end = max.round().clamp(0.0, bound) as u32;
    if end > start {
        return Some((start, end));
    }

    if limit == 0 || max <= min || max <= 0.0 || min >= bound {
        return None;
    }
    let start = (min.max(0.0).floor() as u32).min(limit - 1);
    Some((start, start + 1))
}

/// Fixed aspect ratio for the crop output, `x : y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AspectRatio {
    pub x: u32,
    pub y: u32,
}

impl AspectRatio {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn square() -> Self {
        Self::new(1, 1)
    }

    pub fn validate(&self) -> Result<(), CropError> {
        if self.x == 0 || self.y == 0 {
            return Err(CropError::Transform(format!(
                "aspect ratio {}:{} has a zero term",
                self.x, self.y
            )));
        }
        Ok(())
    }

    /// Shrink the longer side of `rect` so it matches this ratio.
    ///
    /// The top-left corner stays put; neither side drops below one pixel.
    pub fn fit(&self, rect: PixelRect) -> Result<PixelRect, CropError> {
        self.validate()?;

        let (x, y) = (u64::from(self.x), u64::from(self.y));
        let (w, h) = (u64::from(rect.width), u64::from(rect.height));

        let mut fitted = rect;
        if w * y > h * x {
            // Too wide
            fitted.width = ((h * x + y / 2) / y).clamp(1, w) as u32;
        } else if w * y < h * x {
            // Too tall
            fitted.height = ((w * y + x / 2) / x).clamp(1, h) as u32;
        }
        Ok(fitted)
    }
}

/// Crop polygon plus the rotation and flips applied to it.
#[derive(Debug, Clone, PartialEq)]
pub struct CropGeometry {
    points: Vec<Point>,
    rotation: u16,
    flip_horizontal: bool,
    flip_vertical: bool,
}

impl CropGeometry {
    /// Minimum number of polygon points.
    pub const MIN_POINTS: usize = 4;

    pub fn new(points: Vec<Point>, rotation_degrees: i32) -> Self {
        Self {
            points,
            rotation: rotation_degrees.rem_euclid(360) as u16,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }

    /// Build from interleaved `[x0, y0, x1, y1, ...]` coordinates.
    pub fn from_flat(coords: &[f64], rotation_degrees: i32) -> Result<Self, CropError> {
        if coords.len() % 2 != 0 {
            return Err(CropError::Transform(format!(
                "odd number of polygon coordinates ({})",
                coords.len()
            )));
        }
        let points = coords
            .chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect();
        Ok(Self::new(points, rotation_degrees))
    }

    /// A rectangle covering the whole `width` x `height` image, no rotation.
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        Self::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(w, 0.0),
                Point::new(w, h),
                Point::new(0.0, h),
            ],
            0,
        )
    }

    pub fn with_flips(mut self, horizontal: bool, vertical: bool) -> Self {
        self.flip_horizontal = horizontal;
        self.flip_vertical = vertical;
        self
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Rotation in degrees, 0..360, clockwise.
    pub fn rotation(&self) -> u16 {
        self.rotation
    }

    pub fn flip_horizontal(&self) -> bool {
        self.flip_horizontal
    }

    pub fn flip_vertical(&self) -> bool {
        self.flip_vertical
    }

    /// True for 0, 90, 180 and 270 degrees.
    pub fn is_right_angle(&self) -> bool {
        self.rotation % 90 == 0
    }

    /// Check the polygon has enough points to describe a crop quadrilateral.
    pub fn validate(&self) -> Result<(), CropError> {
        if self.points.len() < Self::MIN_POINTS {
            return Err(CropError::Transform(format!(
                "crop polygon needs at least {} points, got {}",
                Self::MIN_POINTS,
                self.points.len()
            )));
        }
        Ok(())
    }

    /// Pixel rectangle enclosing the polygon, clamped to a `width` x `height` image.
    pub fn pixel_rect(&self, width: u32, height: u32) -> Result<PixelRect, CropError> {
        self.validate()?;
        PixelRect::enclosing(self.points.iter().copied(), width, height)
    }

    /// Same geometry with every point shifted by `(-dx, -dy)`.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        self.map_points(|p| Point::new(p.x - dx, p.y - dy))
    }

    /// Same geometry with every point multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        self.map_points(|p| Point::new(p.x * factor, p.y * factor))
    }

    fn map_points(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            points: self.points.iter().copied().map(f).collect(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_normalised() {
        assert_eq!(CropGeometry::new(vec![], 360).rotation(), 0);
        assert_eq!(CropGeometry::new(vec![], -90).rotation(), 270);
        assert_eq!(CropGeometry::new(vec![], 725).rotation(), 5);
    }

    #[test]
    fn test_from_flat() {
        let geometry =
            CropGeometry::from_flat(&[0.0, 0.0, 10.0, 0.0, 10.0, 5.0, 0.0, 5.0], 90).unwrap();
        assert_eq!(geometry.points().len(), 4);
        assert_eq!(geometry.points()[2], Point::new(10.0, 5.0));
        assert!(geometry.is_right_angle());

        assert!(CropGeometry::from_flat(&[1.0, 2.0, 3.0], 0).is_err());
    }

    #[test]
    fn test_full_frame_rect() {
        let rect = CropGeometry::full_frame(40, 30).pixel_rect(40, 30).unwrap();
        assert!(rect.is_full(40, 30));
    }

    #[test]
    fn test_rect_clamped_to_image() {
        let geometry = CropGeometry::from_flat(
            &[-10.0, -10.0, 150.0, -10.0, 150.0, 60.0, -10.0, 60.0],
            0,
        )
        .unwrap();
        let rect = geometry.pixel_rect(100, 50).unwrap();
        assert_eq!(rect, PixelRect::full(100, 50));
    }

    #[test]
    fn test_too_few_points() {
        let geometry = CropGeometry::from_flat(&[0.0, 0.0, 10.0, 10.0], 0).unwrap();
        assert!(matches!(
            geometry.pixel_rect(100, 100),
            Err(CropError::Transform(_))
        ));
    }

    #[test]
    fn test_degenerate_polygon() {
        // All points on a vertical line
        let geometry =
            CropGeometry::from_flat(&[5.0, 0.0, 5.0, 10.0, 5.0, 20.0, 5.0, 30.0], 0).unwrap();
        assert!(geometry.pixel_rect(100, 100).is_err());
    }

    #[test]
    fn test_sub_pixel_polygon_keeps_one_pixel() {
        // A 3px crop scaled down by 8 spans less than a pixel
        let geometry = CropGeometry::from_flat(&[4.0, 4.0, 7.0, 4.0, 7.0, 7.0, 4.0, 7.0], 0)
            .unwrap()
            .scaled(1.0 / 8.0);
        let rect = geometry.pixel_rect(5, 5).unwrap();
        assert_eq!(rect, PixelRect::new(0, 0, 1, 1));

        // Near the far edge the kept pixel stays inside the image
        let edge = CropGeometry::from_flat(&[4.6, 4.6, 4.9, 4.6, 4.9, 4.9, 4.6, 4.9], 0).unwrap();
        assert_eq!(edge.pixel_rect(5, 5).unwrap(), PixelRect::new(4, 4, 1, 1));
    }

    #[test]
    fn test_polygon_outside_image() {
        let geometry = CropGeometry::from_flat(
            &[200.0, 200.0, 300.0, 200.0, 300.0, 300.0, 200.0, 300.0],
            0,
        )
        .unwrap();
        assert!(geometry.pixel_rect(100, 100).is_err());
    }

    #[test]
    fn test_non_finite_point() {
        let geometry = CropGeometry::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(f64::NAN, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            0,
        );
        assert!(geometry.pixel_rect(100, 100).is_err());
    }

    #[test]
    fn test_translate_and_scale() {
        let geometry = CropGeometry::full_frame(100, 80)
            .with_flips(true, false)
            .translated(20.0, 10.0)
            .scaled(0.5);
        assert_eq!(geometry.points()[0], Point::new(-10.0, -5.0));
        assert_eq!(geometry.points()[2], Point::new(40.0, 35.0));
        assert!(geometry.flip_horizontal());
    }

    #[test]
    fn test_aspect_square_trims_longer_side() {
        let square = AspectRatio::square();
        let wide = square.fit(PixelRect::new(5, 5, 120, 80)).unwrap();
        assert_eq!(wide, PixelRect::new(5, 5, 80, 80));

        let tall = square.fit(PixelRect::new(0, 0, 60, 90)).unwrap();
        assert_eq!(tall, PixelRect::new(0, 0, 60, 60));
    }

    #[test]
    fn test_aspect_16_9() {
        let ratio = AspectRatio::new(16, 9);
        let fitted = ratio.fit(PixelRect::full(1000, 1000)).unwrap();
        assert_eq!(fitted.width, 1000);
        assert_eq!(fitted.height, 563);
    }

    #[test]
    fn test_aspect_already_matching() {
        let ratio = AspectRatio::new(4, 3);
        let rect = PixelRect::full(800, 600);
        assert_eq!(ratio.fit(rect).unwrap(), rect);
    }

    #[test]
    fn test_aspect_zero_term() {
        assert!(AspectRatio::new(0, 3).fit(PixelRect::full(10, 10)).is_err());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================
