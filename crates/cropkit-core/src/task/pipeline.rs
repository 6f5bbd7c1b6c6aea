//! The synchronous body of a crop task, run on the blocking pool.
//!
//! Stage order: obtain source, transform, resize, then return or persist.
//! Cancellation is checked before each stage. Any buffer the pipeline holds
//! when it stops, for whatever reason, is dropped on the way out.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::request::{CropSource, RequestParts};
use super::{CropOutcome, Stages};
use crate::buffer::Bitmap;
use crate::config::CropConfig;
use crate::decode::{DecodeHint, StoredImage};
use crate::error::CropError;
use crate::resize::{downsample, TargetBounds};
use crate::transform::{AspectRatio, CropGeometry};

/// Why the pipeline stopped before producing an outcome.
#[derive(Debug)]
pub(super) enum Interrupt {
    /// Cancellation was observed at a checkpoint. Nothing is delivered.
    Cancelled,
    Failed(CropError),
}

impl From<CropError> for Interrupt {
    fn from(err: CropError) -> Self {
        Interrupt::Failed(err)
    }
}

pub(super) struct Pipeline<'a> {
    pub stages: &'a Stages,
    pub config: &'a CropConfig,
    pub cancellation: &'a CancellationToken,
}

impl Pipeline<'_> {
    pub fn execute(&self, request: RequestParts) -> Result<CropOutcome, Interrupt> {
        let RequestParts {
            source,
            geometry,
            aspect,
            bounds,
            sizing,
            destination,
        } = request;

        self.checkpoint("source")?;
        let (cropped, sample_factor) = match source.ok_or(CropError::NoSource)? {
            CropSource::Bitmap(bitmap) => self.crop_in_memory(bitmap, &geometry, aspect)?,
            CropSource::Stored(stored) => self.crop_stored(&stored, &geometry, aspect, bounds)?,
        };

        self.checkpoint("resize")?;
        let resized = self.stages.resizer.resize(cropped, bounds, sizing)?;

        let Some(destination) = destination else {
            self.checkpoint("deliver")?;
            return Ok(CropOutcome::Cropped {
                bitmap: resized,
                sample_factor,
            });
        };

        self.checkpoint("persist")?;
        let written = self.stages.sink.write(&resized, &destination);
        drop(resized);
        written?;

        Ok(CropOutcome::Saved {
            locator: destination.locator,
            sample_factor,
        })
    }

    fn checkpoint(&self, stage: &'static str) -> Result<(), Interrupt> {
        if self.cancellation.is_cancelled() {
            debug!(stage, "Crop cancelled");
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    /// Transform an in-memory source, shrinking a copy of it after OOM.
    fn crop_in_memory(
        &self,
        source: Bitmap,
        geometry: &CropGeometry,
        aspect: Option<AspectRatio>,
    ) -> Result<(Bitmap, u32), Interrupt> {
        let result = self.with_oom_retry(|multiplier| {
            self.checkpoint("transform")?;
            if multiplier == 1 {
                let output = self.stages.transformer.apply(&source, geometry, aspect)?;
                return Ok((output, 1));
            }

            let smaller = downsample(
                &source,
                multiplier,
                self.config.resize_filter,
                &self.stages.budget,
            )?;
            let scaled = geometry.scaled(1.0 / f64::from(multiplier));
            let output = self.stages.transformer.apply(&smaller, &scaled, aspect)?;
            Ok((output, multiplier))
        });
        drop(source);
        result
    }

    /// Decode and transform a stored source, sampling more coarsely after OOM.
    fn crop_stored(
        &self,
        stored: &StoredImage,
        geometry: &CropGeometry,
        aspect: Option<AspectRatio>,
        bounds: TargetBounds,
    ) -> Result<(Bitmap, u32), Interrupt> {
        let region = geometry.pixel_rect(stored.width, stored.height)?;

        self.with_oom_retry(|multiplier| {
            self.checkpoint("decode")?;
            let hint = DecodeHint::new(Some(region), bounds).with_sample_multiplier(multiplier);
            let sampled = self.stages.decoder.decode(stored, &hint)?;

            self.checkpoint("transform")?;
            let (x, y) = sampled.origin;
            let local = geometry
                .translated(f64::from(x), f64::from(y))
                .scaled(1.0 / f64::from(sampled.sample_factor.max(1)));
            let output = self.stages.transformer.apply(&sampled.bitmap, &local, aspect)?;
            Ok((output, sampled.sample_factor))
        })
    }

    /// Run `attempt` with sample multipliers 1, 2, 4... while it fails with
    /// `OutOfMemory` and the multiplier stays within the configured ceiling.
    ///
    /// Stops early when an attempt fails asking for exactly as many bytes as
    /// the one before: that allocation does not depend on the sampling.
    fn with_oom_retry<T>(
        &self,
        mut attempt: impl FnMut(u32) -> Result<T, Interrupt>,
    ) -> Result<T, Interrupt> {
        let ceiling = self.config.retry_ceiling();
        let mut multiplier = 1u32;
        let mut last_requested = None;
        loop {
            match attempt(multiplier) {
                Err(Interrupt::Failed(err)) if err.is_out_of_memory() && multiplier < ceiling => {
                    let requested = match &err {
                        CropError::OutOfMemory { requested, .. } => Some(*requested),
                        _ => None,
                    };
                    if requested.is_some() && requested == last_requested {
                        warn!(
                            error = %err,
                            sample_multiplier = multiplier,
                            "Out of memory regardless of sampling, giving up"
                        );
                        return Err(Interrupt::Failed(err));
                    }
                    last_requested = requested;
                    multiplier *= 2;
                    warn!(
                        error = %err,
                        sample_multiplier = multiplier,
                        "Out of memory, retrying crop at lower resolution"
                    );
                }
                other => return other,
            }
        }
    }
}
