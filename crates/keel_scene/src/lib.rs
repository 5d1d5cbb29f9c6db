//! Keel Scene
//!
//! The scene graph: name-keyed renderable entities (meshes, terrain,
//! lights, skybox), a load/unload lifecycle state machine, and the
//! per-frame spatial queries that feed the render-view packet. Query output
//! always lives in the caller's frame allocator.

pub mod config;
pub mod entity;
mod scene;

pub use config::{
    DirectionalLightConfig, MeshConfig, PointLightConfig, SceneConfig, SkyboxConfig,
    TerrainConfig, TransformConfig,
};
pub use entity::{DirectionalLight, Mesh, PointLight, Skybox, Terrain, Transform};
pub use scene::{RayHit, Scene, SceneError, SceneState, MAX_POINT_LIGHTS};
