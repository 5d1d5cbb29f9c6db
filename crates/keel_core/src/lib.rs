//! Keel Engine Core
//!
//! Contains the fundamental engine services:
//! - Arena-backed allocators and frame-scoped collections
//! - Engine context (dependency-injected core services)
//! - Frame data and timing
//! - Math and culling utilities

pub mod context;
pub mod event;
pub mod frame;
pub mod math;
pub mod memory;
pub mod time;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
