//! Allocation metric registry
//!
//! Every engine allocator registers itself here once at startup and reports
//! each allocate/free with its requested and required (post-alignment) byte
//! counts. The registry keeps per-allocator, per-tag running totals so leaks
//! and fragmentation show up during development.

use crate::report::format_bytes;
use crate::tag::MemoryTag;
use parking_lot::Mutex;
use std::fmt::Write;
use thiserror::Error;

/// Upper bound on tracked allocators. The engine has a small, known set of
/// long-lived allocators; hitting this limit is a configuration error.
pub const MAX_TRACKED_ALLOCATORS: usize = 16;

/// Upper bound on allocator name length.
pub const MAX_ALLOCATOR_NAME: usize = 64;

/// Errors that can occur while registering an allocator.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("allocator table is full ({limit} slots), cannot track '{name}'")]
    TableFull { name: String, limit: usize },

    #[error("allocator name '{name}' exceeds {limit} characters")]
    NameTooLong { name: String, limit: usize },
}

/// What kind of allocator a slot tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocatorKind {
    Dynamic,
    Linear,
    Stack,
    Gpu,
    External,
}

impl AllocatorKind {
    fn name(self) -> &'static str {
        match self {
            AllocatorKind::Dynamic => "dynamic",
            AllocatorKind::Linear => "linear",
            AllocatorKind::Stack => "stack",
            AllocatorKind::Gpu => "gpu",
            AllocatorKind::External => "external",
        }
    }
}

/// Handle to a registered allocator's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocatorId(u32);

/// Running totals for one memory tag within one allocator.
///
/// `requested` is what callers asked for; `required` includes alignment and
/// bookkeeping overhead. Tracking both exposes allocator overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagStats {
    pub requested: u64,
    pub required: u64,
    pub count: u64,
}

struct AllocatorSlot {
    name: String,
    kind: AllocatorKind,
    available_space: u64,
    tags: [TagStats; MemoryTag::COUNT],
}

impl AllocatorSlot {
    fn live_count(&self) -> u64 {
        self.tags.iter().map(|t| t.count).sum()
    }

    fn required_bytes(&self) -> u64 {
        self.tags.iter().map(|t| t.required).sum()
    }
}

/// Registry of named allocators and their per-tag allocation volume.
///
/// All methods take `&self`; an internal mutex makes the registry safe to
/// share between allocators on different threads via `Arc`.
pub struct MetricRegistry {
    slots: Mutex<Vec<Option<AllocatorSlot>>>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Reserve a tracking slot for an allocator.
    ///
    /// Fails when the slot table is full or the name exceeds
    /// [`MAX_ALLOCATOR_NAME`]; both indicate a configuration error the
    /// caller should treat as fatal at startup.
    pub fn register_allocator(
        &self,
        name: &str,
        kind: AllocatorKind,
        available_space: u64,
    ) -> Result<AllocatorId, MetricsError> {
        if name.len() > MAX_ALLOCATOR_NAME {
            return Err(MetricsError::NameTooLong {
                name: name.to_string(),
                limit: MAX_ALLOCATOR_NAME,
            });
        }

        let slot = AllocatorSlot {
            name: name.to_string(),
            kind,
            available_space,
            tags: [TagStats::default(); MemoryTag::COUNT],
        };

        let mut slots = self.slots.lock();
        if let Some(index) = slots.iter().position(Option::is_none) {
            slots[index] = Some(slot);
            return Ok(AllocatorId(index as u32));
        }
        if slots.len() >= MAX_TRACKED_ALLOCATORS {
            return Err(MetricsError::TableFull {
                name: name.to_string(),
                limit: MAX_TRACKED_ALLOCATORS,
            });
        }
        slots.push(Some(slot));
        Ok(AllocatorId(slots.len() as u32 - 1))
    }

    /// Release an allocator's slot, logging a summary of anything still live.
    pub fn unregister_allocator(&self, id: AllocatorId) {
        let mut slots = self.slots.lock();
        let slot = take_slot(&mut slots, id);
        let live = slot.live_count();
        if live > 0 {
            tracing::warn!(
                allocator = %slot.name,
                live_allocations = live,
                bytes = slot.required_bytes(),
                "allocator unregistered with live allocations"
            );
        } else {
            tracing::debug!(allocator = %slot.name, "allocator unregistered clean");
        }
    }

    /// Record one allocation against `tag`.
    pub fn record_alloc(&self, id: AllocatorId, tag: MemoryTag, requested: u64, required: u64) {
        let mut slots = self.slots.lock();
        let stats = &mut slot_mut(&mut slots, id).tags[tag.index()];
        stats.requested += requested;
        stats.required += required;
        stats.count += 1;
    }

    /// Record one free against `tag`.
    ///
    /// Panics on counter underflow: freeing more than was allocated under a
    /// tag means an allocator is corrupted, which is not recoverable.
    pub fn record_free(&self, id: AllocatorId, tag: MemoryTag, requested: u64, required: u64) {
        let mut slots = self.slots.lock();
        let slot = slot_mut(&mut slots, id);
        let stats = &mut slot.tags[tag.index()];
        if stats.count == 0 || stats.requested < requested || stats.required < required {
            panic!(
                "metrics underflow: allocator '{}' freed {} bytes under tag '{}' with only {} tracked",
                slot.name,
                required,
                tag.name(),
                stats.required,
            );
        }
        stats.requested -= requested;
        stats.required -= required;
        stats.count -= 1;
    }

    /// Zero every counter in one allocator's slot. Used when a linear or
    /// stack allocator reclaims its whole arena at once.
    pub fn reset_allocator(&self, id: AllocatorId) {
        let mut slots = self.slots.lock();
        let slot = slot_mut(&mut slots, id);
        slot.tags = [TagStats::default(); MemoryTag::COUNT];
    }

    /// Outstanding stats for one tag of one allocator.
    pub fn usage(&self, id: AllocatorId, tag: MemoryTag) -> TagStats {
        let mut slots = self.slots.lock();
        slot_mut(&mut slots, id).tags[tag.index()]
    }

    /// Total live allocation count across all tags of one allocator.
    pub fn allocation_count(&self, id: AllocatorId) -> u64 {
        let mut slots = self.slots.lock();
        slot_mut(&mut slots, id).live_count()
    }

    /// Total required bytes outstanding across all tags of one allocator.
    pub fn allocated_bytes(&self, id: AllocatorId) -> u64 {
        let mut slots = self.slots.lock();
        slot_mut(&mut slots, id).required_bytes()
    }

    /// Human-readable breakdown per allocator and tag. Reporting only, no
    /// effect on allocator state.
    pub fn report(&self) -> String {
        let slots = self.slots.lock();
        let mut out = String::from("memory usage:\n");
        for slot in slots.iter().flatten() {
            let _ = writeln!(
                out,
                "  {} ({}): {} / {} in {} allocations",
                slot.name,
                slot.kind.name(),
                format_bytes(slot.required_bytes()),
                format_bytes(slot.available_space),
                slot.live_count(),
            );
            for tag in MemoryTag::ALL {
                let stats = slot.tags[tag.index()];
                if stats.count == 0 && stats.required == 0 {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "    {:<9} {:>10} requested, {:>10} required, {} live",
                    tag.name(),
                    format_bytes(stats.requested),
                    format_bytes(stats.required),
                    stats.count,
                );
            }
        }
        out
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn slot_mut<'a>(
    slots: &'a mut [Option<AllocatorSlot>],
    id: AllocatorId,
) -> &'a mut AllocatorSlot {
    slots
        .get_mut(id.0 as usize)
        .and_then(Option::as_mut)
        .unwrap_or_else(|| panic!("metrics: unknown allocator id {}", id.0))
}

fn take_slot(slots: &mut [Option<AllocatorSlot>], id: AllocatorId) -> AllocatorSlot {
    slots
        .get_mut(id.0 as usize)
        .and_then(Option::take)
        .unwrap_or_else(|| panic!("metrics: unknown allocator id {}", id.0))
}
