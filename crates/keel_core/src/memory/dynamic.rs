//! General-purpose sub-allocation out of one reserved arena
//!
//! Blocks are self-describing through a side table keyed by the block
//! handle, so freeing needs only the handle: the `malloc`/`free` ergonomics
//! of the classic header/footer scheme without in-band pointer arithmetic.

use super::free_list::FreeList;
use super::{align_up, MemoryError, MAX_SINGLE_ALLOCATION};
use keel_metrics::{AllocatorId, AllocatorKind, MemoryTag, MetricRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Smallest allocation hint handed to the free list's sizing formula.
const SMALLEST_ALLOCATION: usize = 32;

/// Handle to a live allocation: the block's aligned offset within the arena.
///
/// Valid only for the allocator that produced it; handing it to another
/// instance is a fatal usage error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(usize);

impl BlockRef {
    /// Offset of the block's first byte within the arena.
    #[inline]
    pub fn offset(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct BlockMeta {
    /// Range actually taken from the free list (includes alignment slack).
    range_offset: usize,
    range_size: usize,
    /// User-visible size and the alignment it was requested with.
    size: usize,
    align: usize,
    tag: MemoryTag,
}

struct DynamicInner {
    arena: Box<[u8]>,
    free_list: FreeList,
    blocks: HashMap<usize, BlockMeta>,
}

/// Alignment-aware allocator over one owned arena, backed by a first-fit
/// free list. A single internal mutex covers every mutating operation and
/// introspection query, so any live instance is safe for concurrent callers;
/// distinct instances are fully independent.
pub struct DynamicAllocator {
    inner: Mutex<DynamicInner>,
    metrics: Arc<MetricRegistry>,
    metrics_id: AllocatorId,
    name: String,
}

impl std::fmt::Debug for DynamicAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicAllocator")
            .field("name", &self.name)
            .field("metrics_id", &self.metrics_id)
            .finish_non_exhaustive()
    }
}

impl DynamicAllocator {
    /// Combined arena + free-list metadata reservation for a desired usable
    /// size. Lets startup code budget the whole allocation from one number.
    pub fn memory_requirement(usable_size: usize) -> usize {
        usable_size + FreeList::memory_requirement(usable_size, SMALLEST_ALLOCATION)
    }

    /// Reserve `usable_size` bytes of arena plus the free-list node storage
    /// derived from [`FreeList::memory_requirement`], and register with the
    /// metric registry.
    pub fn new(
        name: &str,
        usable_size: usize,
        metrics: Arc<MetricRegistry>,
    ) -> Result<Self, MemoryError> {
        if usable_size == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        let metadata = FreeList::memory_requirement(usable_size, SMALLEST_ALLOCATION);
        tracing::debug!(
            allocator = name,
            usable = usable_size,
            metadata,
            "reserving dynamic allocator arena"
        );

        let metrics_id =
            metrics.register_allocator(name, AllocatorKind::Dynamic, usable_size as u64)?;
        Ok(Self {
            inner: Mutex::new(DynamicInner {
                arena: vec![0u8; usable_size].into_boxed_slice(),
                free_list: FreeList::new(usable_size, SMALLEST_ALLOCATION),
                blocks: HashMap::new(),
            }),
            metrics,
            metrics_id,
            name: name.to_string(),
        })
    }

    /// Allocate `size` bytes aligned to `align`, zero-initialized.
    ///
    /// The free list is asked for `size + align - 1` bytes so a conforming
    /// offset always exists inside the range. Exhaustion surfaces as
    /// [`MemoryError::OutOfSpace`], never as a silent null.
    pub fn allocate(
        &self,
        tag: MemoryTag,
        size: usize,
        align: usize,
    ) -> Result<BlockRef, MemoryError> {
        assert!(size > 0, "zero-sized allocation from '{}'", self.name);
        assert!(
            align.is_power_of_two(),
            "alignment {align} is not a power of two"
        );
        if size as u64 > MAX_SINGLE_ALLOCATION {
            return Err(MemoryError::ExceedsMaxAllocation {
                requested: size,
                limit: MAX_SINGLE_ALLOCATION,
            });
        }
        let required = size
            .checked_add(align - 1)
            .ok_or(MemoryError::CapacityOverflow { requested: size })?;

        let mut inner = self.inner.lock();
        let range_offset =
            inner
                .free_list
                .allocate_block(required)
                .ok_or(MemoryError::OutOfSpace {
                    requested: required,
                    available: inner.free_list.free_space(),
                })?;
        let aligned = align_up(range_offset, align);
        debug_assert!(aligned + size <= range_offset + required);

        inner.arena[aligned..aligned + size].fill(0);
        let previous = inner.blocks.insert(
            aligned,
            BlockMeta {
                range_offset,
                range_size: required,
                size,
                align,
                tag,
            },
        );
        debug_assert!(previous.is_none(), "free list returned a live range");

        self.metrics
            .record_alloc(self.metrics_id, tag, size as u64, required as u64);
        Ok(BlockRef(aligned))
    }

    /// Return a block to the arena. Needs only the handle; size, alignment
    /// and tag are recovered from the allocator's own records.
    ///
    /// Panics on a handle this allocator did not produce: that is caller
    /// corruption, and continuing would corrupt unrelated memory.
    pub fn free(&self, block: BlockRef) {
        let mut inner = self.inner.lock();
        let meta = self.meta_or_panic(&mut inner, block, "free");
        inner.blocks.remove(&block.0);
        inner.free_list.free_block(meta.range_offset, meta.range_size);
        self.metrics.record_free(
            self.metrics_id,
            meta.tag,
            meta.size as u64,
            meta.range_size as u64,
        );
    }

    /// Size and alignment of a live block, for callers that need to know how
    /// much a block occupies without freeing it.
    pub fn size_alignment(&self, block: BlockRef) -> (usize, usize) {
        let mut inner = self.inner.lock();
        let meta = self.meta_or_panic(&mut inner, block, "size_alignment");
        (meta.size, meta.align)
    }

    /// Alignment a live block was allocated with.
    pub fn alignment(&self, block: BlockRef) -> usize {
        self.size_alignment(block).1
    }

    /// Run `f` over the block's bytes while holding the allocator lock.
    ///
    /// The closure must not call back into this allocator; keep it short and
    /// never issue GPU or I/O work from inside it.
    pub fn with_block<R>(&self, block: BlockRef, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut inner = self.inner.lock();
        let meta = self.meta_or_panic(&mut inner, block, "with_block");
        f(&mut inner.arena[block.0..block.0 + meta.size])
    }

    pub fn free_space(&self) -> usize {
        self.inner.lock().free_list.free_space()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().free_list.capacity()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn meta_or_panic(&self, inner: &mut DynamicInner, block: BlockRef, op: &str) -> BlockMeta {
        match inner.blocks.get(&block.0) {
            Some(meta) => *meta,
            None => panic!(
                "dynamic allocator '{}': {op} of unknown block at offset {}",
                self.name, block.0
            ),
        }
    }
}

impl Drop for DynamicAllocator {
    fn drop(&mut self) {
        self.metrics.unregister_allocator(self.metrics_id);
    }
}
