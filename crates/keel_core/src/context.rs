//! Engine context
//!
//! The owned core services every subsystem needs, passed by reference
//! instead of reached through globals. Constructed once at startup from a
//! [`MemoryConfig`], torn down once at shutdown; allocators unregister from
//! the metric registry as they drop.

use crate::event::EventQueue;
use crate::memory::{DynamicAllocator, LinearAllocator, MemoryError};
use keel_metrics::MetricRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Startup memory configuration.
///
/// `dynamic_allocator_size` is the *usable* byte count; the combined
/// reservation adds the free-list metadata requirement on top (see
/// [`crate::memory::FreeList::memory_requirement`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub dynamic_allocator_size: usize,
    pub frame_allocator_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dynamic_allocator_size: 64 * 1024 * 1024,
            frame_allocator_size: 8 * 1024 * 1024,
        }
    }
}

/// Owned instances of the core services.
pub struct EngineContext {
    pub metrics: Arc<MetricRegistry>,
    /// General-purpose allocator for engine-lifetime data.
    pub allocator: DynamicAllocator,
    /// Per-frame allocator, reset at the top of every frame.
    pub frame_allocator: LinearAllocator,
    pub events: EventQueue,
}

impl EngineContext {
    pub fn new(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let metrics = Arc::new(MetricRegistry::new());
        let allocator = DynamicAllocator::new(
            "engine.dynamic",
            config.dynamic_allocator_size,
            Arc::clone(&metrics),
        )?;
        let frame_allocator = LinearAllocator::new(
            "engine.frame",
            config.frame_allocator_size,
            Arc::clone(&metrics),
        )?;
        tracing::info!(
            dynamic = config.dynamic_allocator_size,
            frame = config.frame_allocator_size,
            "engine context ready"
        );
        Ok(Self {
            metrics,
            allocator,
            frame_allocator,
            events: EventQueue::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTag;

    #[test]
    fn context_wires_allocators_into_one_registry() {
        let config = MemoryConfig {
            dynamic_allocator_size: 64 * 1024,
            frame_allocator_size: 16 * 1024,
        };
        let ctx = EngineContext::new(&config).unwrap();

        let block = ctx.allocator.allocate(MemoryTag::Engine, 128, 8).unwrap();
        ctx.frame_allocator
            .alloc_zeroed::<u8>(MemoryTag::Array, 256)
            .unwrap();

        let report = ctx.metrics.report();
        assert!(report.contains("engine.dynamic"));
        assert!(report.contains("engine.frame"));

        ctx.allocator.free(block);
    }

    #[test]
    fn zero_sized_config_is_rejected() {
        let config = MemoryConfig {
            dynamic_allocator_size: 0,
            frame_allocator_size: 1024,
        };
        assert!(matches!(
            EngineContext::new(&config),
            Err(MemoryError::ZeroCapacity)
        ));
    }
}
