//! Stack allocator for scoped temporaries
//!
//! Same bump core as the frame allocator, but meant for LIFO scratch work:
//! grab a marker, allocate freely, rewind to the marker when the scope ends.
//! There is no individual free; only rewind and the full reset reclaim.

use super::bump::BumpArena;
use super::MemoryError;
use bytemuck::Zeroable;
use keel_metrics::{AllocatorId, AllocatorKind, MemoryTag, MetricRegistry};
use std::mem::MaybeUninit;
use std::sync::Arc;

/// Checkpoint into a [`StackAllocator`], produced by [`StackAllocator::mark`].
#[derive(Debug, Clone, Copy)]
pub struct StackMarker(usize);

pub struct StackAllocator {
    arena: BumpArena,
    name: String,
    metrics: Arc<MetricRegistry>,
    metrics_id: AllocatorId,
}

impl StackAllocator {
    pub fn new(
        name: &str,
        capacity: usize,
        metrics: Arc<MetricRegistry>,
    ) -> Result<Self, MemoryError> {
        let arena = BumpArena::new(capacity)?;
        let metrics_id =
            metrics.register_allocator(name, AllocatorKind::Stack, capacity as u64)?;
        Ok(Self {
            arena,
            name: name.to_string(),
            metrics,
            metrics_id,
        })
    }

    pub fn alloc_zeroed<T: Zeroable>(
        &self,
        tag: MemoryTag,
        len: usize,
    ) -> Result<&mut [T], MemoryError> {
        let before = self.arena.allocated();
        let slice = self.arena.alloc_zeroed::<T>(len)?;
        let required = self.arena.allocated() - before;
        self.metrics.record_alloc(
            self.metrics_id,
            tag,
            (len * std::mem::size_of::<T>()) as u64,
            required as u64,
        );
        Ok(slice)
    }

    pub fn alloc_uninit<T>(
        &self,
        tag: MemoryTag,
        len: usize,
    ) -> Result<&mut [MaybeUninit<T>], MemoryError> {
        let before = self.arena.allocated();
        let slice = self.arena.alloc_uninit::<T>(len)?;
        let required = self.arena.allocated() - before;
        self.metrics.record_alloc(
            self.metrics_id,
            tag,
            (len * std::mem::size_of::<T>()) as u64,
            required as u64,
        );
        Ok(slice)
    }

    /// Checkpoint the current top of the stack.
    pub fn mark(&self) -> StackMarker {
        StackMarker(self.arena.mark())
    }

    /// Reclaim everything allocated after `marker`. Metric totals are left
    /// untouched until [`reset_all`](Self::reset_all); the registry tracks
    /// high-water usage for this allocator kind.
    pub fn rewind(&mut self, marker: StackMarker) {
        self.arena.rewind(marker.0);
    }

    /// Reclaim the whole arena and zero the metric slot.
    pub fn reset_all(&mut self) {
        self.arena.reset();
        self.metrics.reset_allocator(self.metrics_id);
    }

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

impl Drop for StackAllocator {
    fn drop(&mut self) {
        self.metrics.unregister_allocator(self.metrics_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewind_reclaims_a_scope() {
        let mut stack =
            StackAllocator::new("test.stack", 1024, Arc::new(MetricRegistry::new())).unwrap();

        stack.alloc_zeroed::<u8>(MemoryTag::Job, 64).unwrap();
        let outer = stack.allocated();

        let marker = stack.mark();
        stack.alloc_zeroed::<u8>(MemoryTag::Job, 256).unwrap();
        assert_eq!(stack.allocated(), outer + 256);

        stack.rewind(marker);
        assert_eq!(stack.allocated(), outer);
    }

    #[test]
    fn reset_all_reclaims_everything() {
        let mut stack =
            StackAllocator::new("test.stack", 512, Arc::new(MetricRegistry::new())).unwrap();
        stack.alloc_zeroed::<u32>(MemoryTag::Job, 16).unwrap();
        stack.reset_all();
        assert_eq!(stack.allocated(), 0);
    }
}
