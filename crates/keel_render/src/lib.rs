//! Keel Render System
//!
//! The renderer abstraction consumed by the frame loop: an opaque GPU
//! backend sink, materials with per-frame update stamps, a closed set of
//! render passes, and the render-view packet protocol that turns scene
//! query output into pass execution.

pub mod backend;
pub mod material;
pub mod pass;
pub mod types;
pub mod view;

pub use backend::{BackendCall, HeadlessBackend, RendererBackend};
pub use material::{Material, MaterialCache, DEFAULT_MATERIAL_ID};
pub use pass::{PassKind, RenderPass, ShadowMapPass, SkyboxPass, Ui2dPass, WorldPass};
pub use types::{
    GeometryId, GeometryRenderData, GlobalUniforms, MaterialId, RenderError, RenderTarget,
    ShaderId, SkyboxRef,
};
pub use view::{Camera, RenderView, RenderViewPacket, Viewport, WorldRenderData};
