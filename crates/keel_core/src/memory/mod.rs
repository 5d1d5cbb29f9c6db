//! Memory management
//!
//! Arena-backed allocators with metric tracking. The [`DynamicAllocator`]
//! serves general-purpose lifetimes out of one reserved block via a
//! first-fit free list; the [`LinearAllocator`] is the per-frame bump
//! allocator whose contents are reclaimed en masse once per frame; the
//! [`StackAllocator`] covers scoped temporaries with marker-based rewind.
//! Every allocator reports into the [`keel_metrics::MetricRegistry`] it is
//! created with.

mod bump;
mod dynamic;
mod frame_vec;
mod free_list;
mod linear;
mod stack;

pub use dynamic::{BlockRef, DynamicAllocator};
pub use frame_vec::FrameVec;
pub use free_list::FreeList;
pub use linear::LinearAllocator;
pub use stack::{StackAllocator, StackMarker};

pub use keel_metrics::MemoryTag;

use thiserror::Error;

/// Hard per-allocation ceiling. A request above this is a runaway size, not
/// a legitimate allocation, and is rejected before touching the free list.
pub const MAX_SINGLE_ALLOCATION: u64 = 4 * 1024 * 1024 * 1024;

/// Errors produced by the allocator family.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("out of space: requested {requested} bytes with {available} available")]
    OutOfSpace { requested: usize, available: usize },

    #[error("allocation of {requested} bytes exceeds the single-allocation limit of {limit} bytes")]
    ExceedsMaxAllocation { requested: usize, limit: u64 },

    #[error("allocator capacity must be non-zero")]
    ZeroCapacity,

    #[error("size arithmetic overflowed for a request of {requested} elements")]
    CapacityOverflow { requested: usize },

    #[error(transparent)]
    Metrics(#[from] keel_metrics::MetricsError),
}

#[inline]
pub(crate) fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_boundary() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 8), 24);
    }
}
