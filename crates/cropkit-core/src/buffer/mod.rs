//! Image buffers and the memory budget they are charged to.

mod bitmap;
mod budget;

pub use bitmap::Bitmap;
pub use budget::{Lease, MemoryBudget, Reservation};
