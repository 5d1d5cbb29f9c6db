//! Shared render types

use keel_core::math::{Mat4, Vec3, Vec4};
use keel_core::memory::MemoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("backend failed during {operation}: {detail}")]
    Backend {
        operation: &'static str,
        detail: String,
    },

    #[error("viewport has degenerate dimensions {width}x{height}")]
    InvalidViewport { width: u32, height: u32 },

    #[error("shader '{name}' is not loaded")]
    MissingShader { name: String },

    #[error(transparent)]
    FrameMemory(#[from] MemoryError),
}

/// Handle to a shader owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderId(pub u32);

/// Handle to uploaded geometry owned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub u32);

/// Material identifier. Resolution falls back to the default material when
/// the id is unknown to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

/// Render target bound for one pass of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub index: u32,
    pub width: u32,
    pub height: u32,
}

/// Lightweight, copyable view into one renderable. Non-owning; valid only
/// for the frame whose queries produced it.
#[derive(Debug, Clone, Copy)]
pub struct GeometryRenderData {
    pub model: Mat4,
    pub geometry: GeometryId,
    pub material: MaterialId,
    pub winding_inverted: bool,
    pub instance_id: u32,
}

/// Reference to the scene's skybox resources.
#[derive(Debug, Clone, Copy)]
pub struct SkyboxRef {
    pub geometry: GeometryId,
    pub material: MaterialId,
}

/// Per-pass global uniforms, applied once after the shader is bound.
#[derive(Debug, Clone, Copy)]
pub struct GlobalUniforms {
    pub projection: Mat4,
    pub view: Mat4,
    pub view_position: Vec3,
    pub ambient_color: Vec4,
}
