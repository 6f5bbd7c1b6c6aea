//! Accounting for image buffer memory.
//!
//! Every buffer the pipeline creates is first reserved here. A reservation that
//! would push usage past the limit fails with [`CropError::OutOfMemory`], which
//! is the signal the task uses to retry at a lower resolution. Dropping the
//! buffer drops its lease, returning the bytes and counting one release.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use super::Bitmap;
use crate::config::CropConfig;
use crate::error::CropError;

#[derive(Debug)]
struct BudgetState {
    limit: Option<usize>,
    in_use: AtomicUsize,
    allocations: AtomicU64,
    releases: AtomicU64,
}

/// Shared memory budget for image buffers.
///
/// Cloning is cheap; all clones account against the same counters.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    state: Arc<BudgetState>,
}

impl MemoryBudget {
    /// A budget that never refuses a reservation but still counts them.
    pub fn unbounded() -> Self {
        Self::new(None)
    }

    /// A budget that refuses reservations beyond `limit` bytes in use.
    pub fn with_limit(limit: usize) -> Self {
        Self::new(Some(limit))
    }

    /// Build the budget described by `config.memory_limit_bytes`.
    pub fn from_config(config: &CropConfig) -> Self {
        let limit = config
            .memory_limit_bytes
            .map(|bytes| usize::try_from(bytes).unwrap_or(usize::MAX));
        Self::new(limit)
    }

    fn new(limit: Option<usize>) -> Self {
        Self {
            state: Arc::new(BudgetState {
                limit,
                in_use: AtomicUsize::new(0),
                allocations: AtomicU64::new(0),
                releases: AtomicU64::new(0),
            }),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        self.state.limit
    }

    /// Bytes currently held by live leases.
    pub fn in_use(&self) -> usize {
        self.state.in_use.load(Ordering::Acquire)
    }

    /// Bytes that can still be reserved.
    pub fn available(&self) -> usize {
        match self.state.limit {
            Some(limit) => limit.saturating_sub(self.in_use()),
            None => usize::MAX,
        }
    }

    /// Number of leases ever granted.
    pub fn allocations(&self) -> u64 {
        self.state.allocations.load(Ordering::Acquire)
    }

    /// Number of leases returned.
    pub fn releases(&self) -> u64 {
        self.state.releases.load(Ordering::Acquire)
    }

    /// Reserve `bytes` without attaching them to a buffer.
    ///
    /// Used for transient working memory such as a full-size decode that is
    /// sampled down immediately afterwards.
    pub fn reserve_bytes(&self, bytes: usize) -> Result<Lease, CropError> {
        let limit = self.state.limit;
        self.state
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                let next = current.checked_add(bytes)?;
                match limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            })
            .map_err(|current| CropError::OutOfMemory {
                requested: bytes,
                available: limit.map_or(usize::MAX, |limit| limit.saturating_sub(current)),
            })?;

        self.state.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(Lease {
            state: Arc::clone(&self.state),
            bytes,
        })
    }

    /// Reserve room for a `width` x `height` RGB buffer.
    pub fn reserve(&self, width: u32, height: u32) -> Result<Reservation, CropError> {
        let bytes = Bitmap::byte_len(width, height).ok_or(CropError::OutOfMemory {
            requested: usize::MAX,
            available: self.available(),
        })?;
        let lease = self.reserve_bytes(bytes)?;
        Ok(Reservation {
            width,
            height,
            lease,
        })
    }

    /// Allocate a zeroed buffer.
    pub fn allocate(&self, width: u32, height: u32) -> Result<Bitmap, CropError> {
        self.reserve(width, height)?.zeroed()
    }

    /// Charge an already-allocated pixel vector to the budget.
    pub fn adopt(&self, width: u32, height: u32, pixels: Vec<u8>) -> Result<Bitmap, CropError> {
        self.reserve(width, height)?.fill(pixels)
    }
}

/// Bytes held against a [`MemoryBudget`]; returned on drop.
pub struct Lease {
    state: Arc<BudgetState>,
    bytes: usize,
}

impl Lease {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl fmt::Debug for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("bytes", &self.bytes).finish()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.state.in_use.fetch_sub(self.bytes, Ordering::AcqRel);
        self.state.releases.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(bytes = self.bytes, "Released image buffer");
    }
}

/// A granted reservation waiting for its pixels.
#[derive(Debug)]
pub struct Reservation {
    width: u32,
    height: u32,
    lease: Lease,
}

impl Reservation {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Allocate the reserved buffer, zero-filled.
    ///
    /// The allocation itself is fallible: if the allocator cannot provide the
    /// bytes the reservation is returned and `OutOfMemory` reported.
    pub fn zeroed(self) -> Result<Bitmap, CropError> {
        let bytes = self.lease.bytes;
        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(bytes)
            .map_err(|_| CropError::OutOfMemory {
                requested: bytes,
                available: 0,
            })?;
        pixels.resize(bytes, 0);
        Ok(Bitmap::leased(self.width, self.height, pixels, self.lease))
    }

    /// Attach pixels produced elsewhere to this reservation.
    pub fn fill(self, pixels: Vec<u8>) -> Result<Bitmap, CropError> {
        if pixels.len() != self.lease.bytes {
            return Err(CropError::Internal(format!(
                "pixel buffer holds {} bytes, {}x{} needs {}",
                pixels.len(),
                self.width,
                self.height,
                self.lease.bytes
            )));
        }
        Ok(Bitmap::leased(self.width, self.height, pixels, self.lease))
    }
}
