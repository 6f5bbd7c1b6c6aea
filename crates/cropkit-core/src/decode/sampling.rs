//! Power-of-two sampling of a decoded region.
//!
//! A sample factor of `n` keeps one output pixel per `n x n` block of source
//! pixels, averaging the block. Partial blocks at the right and bottom edges
//! are averaged over the pixels they do cover.

use crate::buffer::{Bitmap, MemoryBudget};
use crate::error::CropError;
use crate::resize::TargetBounds;
use crate::transform::PixelRect;

/// Largest power of two that keeps both halves of the image above the bounds.
///
/// Returns 1 when the bounds are unbounded or already larger than the image.
pub fn calculate_sample_factor(width: u32, height: u32, bounds: TargetBounds) -> u32 {
    if bounds.is_unbounded() || (width <= bounds.width && height <= bounds.height) {
        return 1;
    }

    let (half_width, half_height) = (width / 2, height / 2);
    let mut factor = 1u32;
    while half_width / factor > bounds.width && half_height / factor > bounds.height {
        factor *= 2;
    }
    factor
}

/// Dimensions of `rect` after sampling by `factor`, at least one pixel per side.
pub fn sampled_dimensions(rect: PixelRect, factor: u32) -> (u32, u32) {
    let factor = factor.max(1);
    ((rect.width / factor).max(1), (rect.height / factor).max(1))
}

/// Copy `rect` out of `image`, averaging `factor x factor` blocks.
pub fn sample_region(
    image: &Bitmap,
    rect: PixelRect,
    factor: u32,
    budget: &MemoryBudget,
) -> Result<Bitmap, CropError> {
    if rect.width == 0
        || rect.height == 0
        || rect.right() > image.width()
        || rect.bottom() > image.height()
    {
        return Err(CropError::Decode(format!(
            "region {}x{}+{}+{} is outside the {}x{} image",
            rect.width,
            rect.height,
            rect.left,
            rect.top,
            image.width(),
            image.height()
        )));
    }

    let factor = factor.max(1);
    let (out_w, out_h) = sampled_dimensions(rect, factor);
    let mut output = budget.allocate(out_w, out_h)?;
    let dst = output.pixels_mut();

    for oy in 0..out_h {
        let y0 = rect.top + oy * factor;
        let y1 = (y0 + factor).min(rect.bottom());
        for ox in 0..out_w {
            let x0 = rect.left + ox * factor;
            let x1 = (x0 + factor).min(rect.right());

            let mut sum = [0u64; 3];
            for y in y0..y1 {
                for x in x0..x1 {
                    let [r, g, b] = image.pixel(x, y);
                    sum[0] += u64::from(r);
                    sum[1] += u64::from(g);
                    sum[2] += u64::from(b);
                }
            }

            let count = u64::from((x1 - x0) * (y1 - y0));
            let idx = (oy as usize * out_w as usize + ox as usize) * Bitmap::CHANNELS;
            for c in 0..3 {
                dst[idx + c] = ((sum[c] + count / 2) / count) as u8;
            }
        }
    }

    Ok(output)
}

/// Box-averages `rect` from image rows fed top to bottom.
///
/// Produces the same pixels as [`sample_region`] while holding one band of
/// sums instead of the whole image, so a decoder can stream rows into it.
pub(crate) struct RowSampler {
    rect: PixelRect,
    factor: u32,
    out_width: u32,
    rows_end: u32,
    sums: Vec<u64>,
    band_rows: u32,
    done: bool,
    output: Bitmap,
}

impl RowSampler {
    /// `output` must be sized [`sampled_dimensions`]`(rect, factor)`.
    pub fn new(rect: PixelRect, factor: u32, output: Bitmap) -> Self {
        let factor = factor.max(1);
        let (out_width, out_height) = sampled_dimensions(rect, factor);
        let rows_end = rect
            .top
            .saturating_add(out_height.saturating_mul(factor))
            .min(rect.bottom());
        Self {
            rect,
            factor,
            out_width,
            rows_end,
            sums: vec![0; out_width as usize * Bitmap::CHANNELS],
            band_rows: 0,
            done: false,
            output,
        }
    }

    /// True once every row the output depends on has been pushed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed image row `y`, whose pixels take `channels` bytes each.
    ///
    /// One or two channels are read as gray, three or more as RGB with any
    /// alpha ignored.
    pub fn push_row(&mut self, y: u32, row: &[u8], channels: usize) {
        if self.done || y < self.rect.top || y >= self.rows_end {
            return;
        }

        for ox in 0..self.out_width {
            let (x0, x1) = self.columns(ox);
            let base = ox as usize * Bitmap::CHANNELS;
            for x in x0..x1 {
                let rgb = rgb_at(row, x, channels);
                for c in 0..Bitmap::CHANNELS {
                    self.sums[base + c] += u64::from(rgb[c]);
                }
            }
        }

        self.band_rows += 1;
        if self.band_rows == self.factor || y + 1 == self.rows_end {
            self.flush_band(y);
        }
    }

    pub fn finish(self) -> Bitmap {
        self.output
    }

    fn columns(&self, ox: u32) -> (u32, u32) {
        let x0 = self.rect.left + ox * self.factor;
        (x0, x0.saturating_add(self.factor).min(self.rect.right()))
    }

    fn flush_band(&mut self, y: u32) {
        let oy = (y - self.rect.top) / self.factor;
        let band_rows = u64::from(self.band_rows);
        for ox in 0..self.out_width {
            let (x0, x1) = self.columns(ox);
            let count = u64::from(x1 - x0) * band_rows;
            let src = ox as usize * Bitmap::CHANNELS;
            let dst = (oy as usize * self.out_width as usize + ox as usize) * Bitmap::CHANNELS;
            for c in 0..Bitmap::CHANNELS {
                self.output.pixels_mut()[dst + c] = ((self.sums[src + c] + count / 2) / count) as u8;
            }
        }

        self.sums.fill(0);
        self.band_rows = 0;
        self.done = y + 1 >= self.rows_end;
    }
}

fn rgb_at(row: &[u8], x: u32, channels: usize) -> [u8; 3] {
    let start = x as usize * channels;
    match row.get(start..start + channels) {
        Some(&[g]) | Some(&[g, _]) => [g, g, g],
        Some(&[r, g, b, ..]) => [r, g, b],
        _ => [0, 0, 0],
    }
}
