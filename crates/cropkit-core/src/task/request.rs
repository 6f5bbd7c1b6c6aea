//! Crop requests and their builder.

use crate::buffer::Bitmap;
use crate::decode::StoredImage;
use crate::persist::Destination;
use crate::resize::{SizingPolicy, TargetBounds};
use crate::transform::{AspectRatio, CropGeometry};

/// Where the pixels to crop come from.
#[derive(Debug)]
pub enum CropSource {
    /// An already decoded image, moved into the task.
    Bitmap(Bitmap),
    /// An image in storage, decoded by the task at reduced resolution.
    Stored(StoredImage),
}

/// Everything a [`CropTask`](super::CropTask) needs to produce one crop.
///
/// Immutable once built; the task takes ownership of it.
#[derive(Debug)]
pub struct CropRequest {
    source: Option<CropSource>,
    geometry: CropGeometry,
    aspect: Option<AspectRatio>,
    bounds: TargetBounds,
    sizing: SizingPolicy,
    destination: Option<Destination>,
}

impl CropRequest {
    pub fn builder(geometry: CropGeometry) -> CropRequestBuilder {
        CropRequestBuilder::new(geometry)
    }

    pub fn source(&self) -> Option<&CropSource> {
        self.source.as_ref()
    }

    pub fn geometry(&self) -> &CropGeometry {
        &self.geometry
    }

    pub fn aspect(&self) -> Option<AspectRatio> {
        self.aspect
    }

    pub fn bounds(&self) -> TargetBounds {
        self.bounds
    }

    pub fn sizing(&self) -> SizingPolicy {
        self.sizing
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref()
    }

    pub(crate) fn into_parts(self) -> RequestParts {
        RequestParts {
            source: self.source,
            geometry: self.geometry,
            aspect: self.aspect,
            bounds: self.bounds,
            sizing: self.sizing,
            destination: self.destination,
        }
    }
}

/// A request taken apart by the pipeline.
pub(crate) struct RequestParts {
    pub source: Option<CropSource>,
    pub geometry: CropGeometry,
    pub aspect: Option<AspectRatio>,
    pub bounds: TargetBounds,
    pub sizing: SizingPolicy,
    pub destination: Option<Destination>,
}

/// Builder for [`CropRequest`].
///
/// A request built without a source is accepted; the task reports it as
/// [`CropError::NoSource`](crate::CropError::NoSource) when it runs.
#[derive(Debug)]
pub struct CropRequestBuilder {
    source: Option<CropSource>,
    geometry: CropGeometry,
    aspect: Option<AspectRatio>,
    bounds: TargetBounds,
    sizing: SizingPolicy,
    destination: Option<Destination>,
}

impl CropRequestBuilder {
    pub fn new(geometry: CropGeometry) -> Self {
        Self {
            source: None,
            geometry,
            aspect: None,
            bounds: TargetBounds::default(),
            sizing: SizingPolicy::default(),
            destination: None,
        }
    }

    /// Crop an in-memory bitmap. Replaces any previous source.
    pub fn bitmap(self, bitmap: Bitmap) -> Self {
        self.source(CropSource::Bitmap(bitmap))
    }

    /// Crop a stored image. Replaces any previous source.
    pub fn stored(self, image: StoredImage) -> Self {
        self.source(CropSource::Stored(image))
    }

    pub fn source(mut self, source: CropSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn aspect(mut self, aspect: AspectRatio) -> Self {
        self.aspect = Some(aspect);
        self
    }

    pub fn bounds(mut self, width: u32, height: u32) -> Self {
        self.bounds = TargetBounds::new(width, height);
        self
    }

    pub fn sizing(mut self, sizing: SizingPolicy) -> Self {
        self.sizing = sizing;
        self
    }

    /// Persist the result instead of returning it. Quality is clamped to 100.
    pub fn destination(mut self, mut destination: Destination) -> Self {
        destination.quality = destination.quality.min(100);
        self.destination = Some(destination);
        self
    }

    pub fn build(self) -> CropRequest {
        CropRequest {
            source: self.source,
            geometry: self.geometry,
            aspect: self.aspect,
            bounds: self.bounds,
            sizing: self.sizing,
            destination: self.destination,
        }
    }
}
