//! Scene configuration
//!
//! Declarative description of a scene's entities, loaded from JSON and
//! resolved into live entities by `Scene::initialize`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub name: String,
    pub ambient_color: [f32; 4],
    pub skybox: Option<SkyboxConfig>,
    pub directional_light: Option<DirectionalLightConfig>,
    pub point_lights: Vec<PointLightConfig>,
    pub meshes: Vec<MeshConfig>,
    pub terrains: Vec<TerrainConfig>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            name: "scene".to_string(),
            ambient_color: [0.25, 0.25, 0.25, 1.0],
            skybox: None,
            directional_light: None,
            point_lights: Vec::new(),
            meshes: Vec::new(),
            terrains: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    pub position: [f32; 3],
    /// Euler angles in radians, XYZ order.
    pub rotation: [f32; 3],
    pub scale: [f32; 3],
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    pub name: String,
    /// Name of the parent entity; a missing parent leaves the mesh at root.
    pub parent: Option<String>,
    /// Geometry resource acquired from the backend at load.
    pub resource: String,
    pub material: u32,
    pub transparent: bool,
    pub transform: TransformConfig,
    pub half_extents: [f32; 3],
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: None,
            resource: String::new(),
            material: 0,
            transparent: false,
            transform: TransformConfig::default(),
            half_extents: [0.5; 3],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub name: String,
    pub resource: String,
    pub material: u32,
    pub transform: TransformConfig,
    pub half_extents: [f32; 3],
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            resource: String::new(),
            material: 0,
            transform: TransformConfig::default(),
            half_extents: [64.0, 8.0, 64.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyboxConfig {
    pub name: String,
    pub resource: String,
    pub material: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionalLightConfig {
    pub color: [f32; 4],
    pub direction: [f32; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightConfig {
    pub color: [f32; 4],
    pub position: [f32; 3],
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            color: [1.0; 4],
            position: [0.0; 3],
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}
