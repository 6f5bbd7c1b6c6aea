//! Decoding stored images from the filesystem.

use std::fs::File;
use std::io::BufReader;

use image::{ImageError, ImageFormat, ImageReader};

use super::sampling::{calculate_sample_factor, sample_region, sampled_dimensions, RowSampler};
use super::{DecodeHint, SampledDecoder, Sampled, StoredImage};
use crate::buffer::{Bitmap, MemoryBudget};
use crate::error::CropError;
use crate::transform::PixelRect;

/// Decodes any format the `image` crate was built with from a file path.
///
/// Non-interlaced PNGs are streamed row by row into the sampled region, so
/// only one scanline and the sampled output are held. Other formats are
/// decoded at full resolution first; that buffer is charged to the budget
/// until the sampled copy exists.
#[derive(Debug, Clone)]
pub struct FileDecoder {
    budget: MemoryBudget,
}

impl FileDecoder {
    pub fn new(budget: MemoryBudget) -> Self {
        Self { budget }
    }

    fn open(&self, image: &StoredImage) -> Result<ImageReader<BufReader<File>>, CropError> {
        ImageReader::open(image.locator.as_path())
            .and_then(|reader| reader.with_guessed_format())
            .map_err(|e| CropError::Decode(format!("{}: {e}", image.locator)))
    }

    fn decode_full(&self, image: &StoredImage) -> Result<Bitmap, CropError> {
        // Header only, so the full buffer can be reserved before decoding
        let (width, height) = self
            .open(image)?
            .into_dimensions()
            .map_err(|e| map_image_error(image, e))?;
        let reservation = self.budget.reserve(width, height)?;

        let decoded = self
            .open(image)?
            .decode()
            .map_err(|e| map_image_error(image, e))?;
        let rgb = decoded.into_rgb8();
        if rgb.dimensions() != (width, height) {
            return Err(CropError::Decode(format!(
                "{}: header says {width}x{height}, decoded {}x{}",
                image.locator,
                rgb.width(),
                rgb.height()
            )));
        }

        reservation.fill(rgb.into_raw())
    }

    /// Decode everything, then sample the region out of the full buffer.
    fn decode_buffered(&self, image: &StoredImage, hint: &DecodeHint) -> Result<Sampled, CropError> {
        let full = self.decode_full(image)?;
        let (width, height) = full.dimensions();
        let (region, factor) = self.plan(image, hint, width, height)?;

        let bitmap = sample_region(&full, region, factor, &self.budget)?;
        drop(full);

        Ok(Sampled {
            bitmap,
            sample_factor: factor,
            origin: (region.left, region.top),
        })
    }

    /// Sample a PNG while it decodes, never holding more than one full row.
    ///
    /// Returns `None` for interlaced files, whose rows arrive out of order.
    fn decode_png_rows(
        &self,
        image: &StoredImage,
        hint: &DecodeHint,
    ) -> Result<Option<Sampled>, CropError> {
        let file = File::open(image.locator.as_path())
            .map_err(|e| CropError::Decode(format!("{}: {e}", image.locator)))?;
        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder
            .set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().map_err(|e| map_png_error(image, e))?;
        if reader.info().interlaced {
            return Ok(None);
        }

        let (width, height) = (reader.info().width, reader.info().height);
        let channels = reader.output_color_type().0.samples();
        let _scanline = self.budget.reserve_bytes(reader.output_line_size(width))?;

        let (region, factor) = self.plan(image, hint, width, height)?;
        let (out_width, out_height) = sampled_dimensions(region, factor);
        let output = self.budget.allocate(out_width, out_height)?;
        let mut sampler = RowSampler::new(region, factor, output);

        let mut y = 0u32;
        while !sampler.is_done() {
            let row = reader
                .next_row()
                .map_err(|e| map_png_error(image, e))?
                .ok_or_else(|| {
                    CropError::Decode(format!("{}: image data ends at row {y}", image.locator))
                })?;
            sampler.push_row(y, row.data(), channels);
            y += 1;
        }

        Ok(Some(Sampled {
            bitmap: sampler.finish(),
            sample_factor: factor,
            origin: (region.left, region.top),
        }))
    }

    /// Clamp the hinted region to the real image size and choose the sample factor.
    fn plan(
        &self,
        image: &StoredImage,
        hint: &DecodeHint,
        width: u32,
        height: u32,
    ) -> Result<(PixelRect, u32), CropError> {
        if (width, height) != (image.width, image.height) {
            tracing::warn!(
                locator = %image.locator,
                expected_width = image.width,
                expected_height = image.height,
                width,
                height,
                "Stored image size differs from request"
            );
        }

        let region = match hint.region {
            Some(rect) => clamp_region(rect, width, height).ok_or_else(|| {
                CropError::Decode(format!(
                    "{}: region lies outside the {width}x{height} image",
                    image.locator
                ))
            })?,
            None => PixelRect::full(width, height),
        };

        let base = calculate_sample_factor(region.width, region.height, hint.bounds);
        let requested = base.saturating_mul(hint.sample_multiplier.max(1));
        Ok((region, self.fit_to_budget(region, requested)))
    }

    /// Raise `factor` by powers of two until the sampled region fits the budget.
    fn fit_to_budget(&self, region: PixelRect, mut factor: u32) -> u32 {
        let max_factor = region.width.max(region.height).next_power_of_two();
        while factor < max_factor {
            let (w, h) = sampled_dimensions(region, factor);
            match Bitmap::byte_len(w, h) {
                Some(bytes) if bytes <= self.budget.available() => break,
                _ => factor = factor.saturating_mul(2),
            }
        }
        factor
    }
}

impl SampledDecoder for FileDecoder {
    fn decode(&self, image: &StoredImage, hint: &DecodeHint) -> Result<Sampled, CropError> {
        let streamed = match self.open(image)?.format() {
            Some(ImageFormat::Png) => self.decode_png_rows(image, hint)?,
            _ => None,
        };
        let sampled = match streamed {
            Some(sampled) => sampled,
            None => self.decode_buffered(image, hint)?,
        };

        tracing::debug!(
            locator = %image.locator,
            sample_factor = sampled.sample_factor,
            width = sampled.bitmap.width(),
            height = sampled.bitmap.height(),
            "Decoded stored image"
        );
        Ok(sampled)
    }
}

fn clamp_region(rect: PixelRect, width: u32, height: u32) -> Option<PixelRect> {
    let left = rect.left.min(width);
    let top = rect.top.min(height);
    let right = rect.left.saturating_add(rect.width).min(width);
    let bottom = rect.top.saturating_add(rect.height).min(height);
    (right > left && bottom > top).then(|| PixelRect::new(left, top, right - left, bottom - top))
}

fn map_image_error(image: &StoredImage, err: ImageError) -> CropError {
    match err {
        ImageError::Limits(e) => {
            tracing::debug!(
                locator = %image.locator,
                error = %e,
                "Decoder hit its allocation limit"
            );
            CropError::OutOfMemory {
                requested: Bitmap::byte_len(image.width, image.height).unwrap_or(usize::MAX),
                available: 0,
            }
        }
        other => CropError::Decode(format!("{}: {other}", image.locator)),
    }
}

fn map_png_error(image: &StoredImage, err: png::DecodingError) -> CropError {
    match err {
        png::DecodingError::LimitsExceeded => CropError::OutOfMemory {
            requested: Bitmap::byte_len(image.width, image.height).unwrap_or(usize::MAX),
            available: 0,
        },
        other => CropError::Decode(format!("{}: {other}", image.locator)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resize::TargetBounds;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> StoredImage {
        let path = dir.join(name);
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]))
            .save(&path)
            .unwrap();
        StoredImage::new(path.as_path(), width, height)
    }

    #[test]
    fn test_decode_whole_image() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "whole.png", 64, 48);
        let budget = MemoryBudget::unbounded();

        let hint = DecodeHint::new(None, TargetBounds::default());
        let sampled = FileDecoder::new(budget.clone()).decode(&stored, &hint).unwrap();

        assert_eq!(sampled.sample_factor, 1);
        assert_eq!(sampled.origin, (0, 0));
        assert_eq!(sampled.bitmap.dimensions(), (64, 48));
        assert_eq!(sampled.bitmap.pixel(10, 20), [10, 20, 7]);
        // The full decode was released once the region was copied
        assert_eq!(budget.in_use(), sampled.bitmap.byte_size());
    }

    #[test]
    fn test_decode_region_sampled_to_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "region.png", 400, 300);
        let decoder = FileDecoder::new(MemoryBudget::unbounded());

        let hint = DecodeHint::new(
            Some(PixelRect::new(100, 50, 200, 200)),
            TargetBounds::new(50, 50),
        );
        let sampled = decoder.decode(&stored, &hint).unwrap();

        assert_eq!(sampled.sample_factor, 2);
        assert_eq!(sampled.origin, (100, 50));
        assert_eq!(sampled.bitmap.dimensions(), (100, 100));

        let coarser = decoder
            .decode(&stored, &hint.with_sample_multiplier(2))
            .unwrap();
        assert_eq!(coarser.sample_factor, 4);
        assert_eq!(coarser.bitmap.dimensions(), (50, 50));
    }

    #[test]
    fn test_region_clamped_to_image() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "clamp.png", 40, 40);
        let decoder = FileDecoder::new(MemoryBudget::unbounded());

        let hint = DecodeHint::new(Some(PixelRect::new(30, 30, 50, 50)), TargetBounds::default());
        let sampled = decoder.decode(&stored, &hint).unwrap();
        assert_eq!(sampled.bitmap.dimensions(), (10, 10));

        let outside = DecodeHint::new(Some(PixelRect::new(60, 60, 5, 5)), TargetBounds::default());
        assert!(matches!(
            decoder.decode(&stored, &outside),
            Err(CropError::Decode(_))
        ));
    }

    fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> StoredImage {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([40, 80, 120]))
            .save(&path)
            .unwrap();
        StoredImage::new(path.as_path(), width, height)
    }

    #[test]
    fn test_buffered_factor_raised_to_fit_budget() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_jpeg(dir.path(), "budget.jpg", 64, 64);
        // Room for the full decode plus 3000 bytes
        let budget = MemoryBudget::with_limit(64 * 64 * 3 + 3000);

        let hint = DecodeHint::new(None, TargetBounds::default());
        let sampled = FileDecoder::new(budget).decode(&stored, &hint).unwrap();

        // 32x32 needs 3072 bytes, 16x16 fits
        assert_eq!(sampled.sample_factor, 4);
        assert_eq!(sampled.bitmap.dimensions(), (16, 16));
    }

    #[test]
    fn test_buffered_decode_over_budget() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_jpeg(dir.path(), "big.jpg", 64, 64);
        let budget = MemoryBudget::with_limit(1000);

        let hint = DecodeHint::new(None, TargetBounds::default());
        let err = FileDecoder::new(budget.clone()).decode(&stored, &hint).unwrap_err();
        assert!(err.is_out_of_memory());
        assert_eq!(budget.allocations(), 0);
    }

    #[test]
    fn test_png_streamed_within_small_budget() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "streamed.png", 64, 64);
        // Far below the 12288 bytes of a full decode
        let budget = MemoryBudget::with_limit(1000);

        let hint = DecodeHint::new(None, TargetBounds::default());
        let sampled = FileDecoder::new(budget.clone()).decode(&stored, &hint).unwrap();

        // One 192-byte scanline leaves 808 bytes; 16x16 needs 768
        assert_eq!(sampled.sample_factor, 4);
        assert_eq!(sampled.bitmap.dimensions(), (16, 16));
        // Block (1, 2) averages x 4..8 and y 8..12
        assert_eq!(sampled.bitmap.pixel(1, 2), [6, 10, 7]);
        assert_eq!(budget.in_use(), 16 * 16 * 3);
        assert_eq!(budget.allocations(), 2);
    }

    #[test]
    fn test_png_streamed_matches_buffered_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "match.png", 50, 30);
        let budget = MemoryBudget::unbounded();
        let decoder = FileDecoder::new(budget.clone());

        let region = PixelRect::new(3, 5, 41, 19);
        let hint = DecodeHint::new(Some(region), TargetBounds::new(8, 8));
        let streamed = decoder.decode(&stored, &hint).unwrap();

        let full = decoder.decode_full(&stored).unwrap();
        let expected = sample_region(&full, region, streamed.sample_factor, &budget).unwrap();

        assert_eq!(streamed.sample_factor, 2);
        assert_eq!(streamed.origin, (3, 5));
        assert_eq!(streamed.bitmap.pixels(), expected.pixels());
    }

    #[test]
    fn test_gray_png_expanded_to_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_fn(4, 4, |x, _| image::Luma([(x * 50) as u8]))
            .save(&path)
            .unwrap();
        let stored = StoredImage::new(path.as_path(), 4, 4);

        let hint = DecodeHint::new(None, TargetBounds::default());
        let sampled = FileDecoder::new(MemoryBudget::unbounded())
            .decode(&stored, &hint)
            .unwrap();
        assert_eq!(sampled.bitmap.pixel(3, 1), [150, 150, 150]);
    }

    #[test]
    fn test_truncated_png() {
        let dir = tempfile::tempdir().unwrap();
        let stored = write_png(dir.path(), "cut.png", 64, 64);
        let bytes = std::fs::read(stored.locator.as_path()).unwrap();
        std::fs::write(stored.locator.as_path(), &bytes[..bytes.len() / 2]).unwrap();
        let budget = MemoryBudget::unbounded();

        let hint = DecodeHint::new(None, TargetBounds::default());
        let err = FileDecoder::new(budget.clone()).decode(&stored, &hint).unwrap_err();
        assert!(matches!(err, CropError::Decode(_)));
        assert_eq!(budget.in_use(), 0);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let stored = StoredImage::new(dir.path().join("nope.png").as_path(), 10, 10);

        let hint = DecodeHint::new(None, TargetBounds::default());
        let err = FileDecoder::new(MemoryBudget::unbounded())
            .decode(&stored, &hint)
            .unwrap_err();
        assert!(matches!(err, CropError::Decode(_)));
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', 0, 0]).unwrap();
        let stored = StoredImage::new(path.as_path(), 10, 10);
        let budget = MemoryBudget::unbounded();

        let hint = DecodeHint::new(None, TargetBounds::default());
        let err = FileDecoder::new(budget.clone()).decode(&stored, &hint).unwrap_err();
        assert!(matches!(err, CropError::Decode(_)));
        assert_eq!(budget.in_use(), 0);
    }
}
