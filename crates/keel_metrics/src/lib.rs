//! Keel Metrics - Allocation tracking and frame timing
//!
//! Provides the allocation metric registry every engine allocator reports
//! into, plus frame timing utilities for the runtime loop.
//!
//! The registry is a constructed object shared through the engine context,
//! not a global: allocators hold an `Arc<MetricRegistry>` and record on
//! every allocate/free. Reading it back (`report()`) is purely diagnostic
//! and never affects allocator state.

mod frame_timer;
mod registry;
mod report;
mod ring_buffer;
mod tag;

pub use frame_timer::FrameTimer;
pub use registry::{
    AllocatorId, AllocatorKind, MetricRegistry, MetricsError, TagStats, MAX_ALLOCATOR_NAME,
    MAX_TRACKED_ALLOCATORS,
};
pub use report::format_bytes;
pub use ring_buffer::RingBuffer;
pub use tag::MemoryTag;
