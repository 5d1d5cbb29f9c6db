//! Per-frame linear allocator
//!
//! Frame-transient data has a single uniform lifetime (one frame), so
//! per-allocation bookkeeping is wasted work: a bump cursor reset once per
//! frame is both simpler and faster, at the cost of forbidding sub-frame
//! frees.

use super::bump::BumpArena;
use super::MemoryError;
use bytemuck::Zeroable;
use keel_metrics::{AllocatorId, AllocatorKind, MemoryTag, MetricRegistry};
use std::mem::MaybeUninit;
use std::sync::Arc;

/// Bump allocator whose contents live exactly as long as the borrow of the
/// allocator itself. [`reset`](Self::reset) takes `&mut self`, so the borrow
/// checker enforces the frame discipline: nothing allocated in a frame can
/// survive that frame's reset.
///
/// Intentionally not `Sync`: the frame arena is single-writer on the
/// render thread.
pub struct LinearAllocator {
    arena: BumpArena,
    name: String,
    metrics: Arc<MetricRegistry>,
    metrics_id: AllocatorId,
}

impl LinearAllocator {
    /// Create an allocator that owns its arena.
    pub fn new(
        name: &str,
        capacity: usize,
        metrics: Arc<MetricRegistry>,
    ) -> Result<Self, MemoryError> {
        Self::with_arena(name, BumpArena::new(capacity)?, metrics)
    }

    /// Wrap caller-supplied backing memory (for carving a frame arena out of
    /// a larger reservation).
    pub fn from_storage(
        name: &str,
        storage: Box<[u8]>,
        metrics: Arc<MetricRegistry>,
    ) -> Result<Self, MemoryError> {
        Self::with_arena(name, BumpArena::from_storage(storage)?, metrics)
    }

    fn with_arena(
        name: &str,
        arena: BumpArena,
        metrics: Arc<MetricRegistry>,
    ) -> Result<Self, MemoryError> {
        let metrics_id =
            metrics.register_allocator(name, AllocatorKind::Linear, arena.capacity() as u64)?;
        Ok(Self {
            arena,
            name: name.to_string(),
            metrics,
            metrics_id,
        })
    }

    /// Allocate `len` zero-initialized values of `T`, aligned for `T`.
    ///
    /// Failure means the frame budget is blown; callers must treat it as
    /// fatal for the frame, not retry.
    pub fn alloc_zeroed<T: Zeroable>(
        &self,
        tag: MemoryTag,
        len: usize,
    ) -> Result<&mut [T], MemoryError> {
        let before = self.arena.allocated();
        let slice = self.arena.alloc_zeroed::<T>(len)?;
        self.record(tag, len * std::mem::size_of::<T>(), before);
        Ok(slice)
    }

    /// Uninitialized variant backing [`FrameVec`](super::FrameVec).
    pub fn alloc_uninit<T>(
        &self,
        tag: MemoryTag,
        len: usize,
    ) -> Result<&mut [MaybeUninit<T>], MemoryError> {
        let before = self.arena.allocated();
        let slice = self.arena.alloc_uninit::<T>(len)?;
        self.record(tag, len * std::mem::size_of::<T>(), before);
        Ok(slice)
    }

    fn record(&self, tag: MemoryTag, requested: usize, cursor_before: usize) {
        let required = self.arena.allocated() - cursor_before;
        self.metrics
            .record_alloc(self.metrics_id, tag, requested as u64, required as u64);
    }

    /// Reclaim the whole arena: cursor back to zero, memory zero-filled,
    /// metric slot reset. Called exactly once per frame, at the top of the
    /// frame loop.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.metrics.reset_allocator(self.metrics_id);
    }

    /// Bytes allocated since the last reset.
    pub fn allocated(&self) -> usize {
        self.arena.allocated()
    }

    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LinearAllocator {
    fn drop(&mut self) {
        self.metrics.unregister_allocator(self.metrics_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_allocator(capacity: usize) -> LinearAllocator {
        LinearAllocator::new("test.frame", capacity, Arc::new(MetricRegistry::new())).unwrap()
    }

    #[test]
    fn reset_is_idempotent_back_to_base() {
        let mut frame = frame_allocator(4096);
        let base = frame
            .alloc_zeroed::<u8>(MemoryTag::Array, 100)
            .unwrap()
            .as_ptr() as usize;
        frame.alloc_zeroed::<u8>(MemoryTag::Array, 700).unwrap();

        frame.reset();
        assert_eq!(frame.allocated(), 0);
        let again = frame.alloc_zeroed::<u8>(MemoryTag::Array, 1).unwrap();
        assert_eq!(again.as_ptr() as usize, base);
    }

    #[test]
    fn overflow_fails_and_leaves_neighbors_intact() {
        let frame = frame_allocator(128);
        let first = frame.alloc_zeroed::<u8>(MemoryTag::Array, 128).unwrap();
        first.fill(7);

        let err = frame.alloc_zeroed::<u8>(MemoryTag::Array, 1).unwrap_err();
        assert!(matches!(err, MemoryError::OutOfSpace { .. }));
        assert!(first.iter().all(|&b| b == 7));
    }

    #[test]
    fn ten_objects_then_free_all() {
        let metrics = Arc::new(MetricRegistry::new());
        let mut frame =
            LinearAllocator::new("frame", 4096, Arc::clone(&metrics)).unwrap();

        let base = {
            let mut first_ptr = None;
            for _ in 0..10 {
                let chunk = frame.alloc_zeroed::<u8>(MemoryTag::Array, 100).unwrap();
                first_ptr.get_or_insert(chunk.as_ptr() as usize);
            }
            first_ptr.unwrap()
        };
        assert_eq!(frame.allocated(), 1000);
        assert_eq!(metrics.allocated_bytes(frame.metrics_id), 1000);

        frame.reset();
        assert_eq!(frame.allocated(), 0);
        assert_eq!(metrics.allocated_bytes(frame.metrics_id), 0);
        let next = frame.alloc_zeroed::<u8>(MemoryTag::Array, 4).unwrap();
        assert_eq!(next.as_ptr() as usize, base);
    }

    #[test]
    fn alignment_padding_counts_as_required_bytes() {
        let metrics = Arc::new(MetricRegistry::new());
        let frame = LinearAllocator::new("frame", 4096, Arc::clone(&metrics)).unwrap();

        frame.alloc_zeroed::<u8>(MemoryTag::Array, 3).unwrap();
        frame.alloc_zeroed::<u64>(MemoryTag::Array, 1).unwrap();

        let stats = metrics.usage(frame.metrics_id, MemoryTag::Array);
        assert_eq!(stats.requested, 3 + 8);
        // 3 bytes, then 5 bytes of padding up to the u64 boundary, then 8.
        assert_eq!(stats.required, 3 + 5 + 8);
    }
}
