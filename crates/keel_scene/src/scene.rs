//! Scene lifecycle and per-frame queries

use crate::config::SceneConfig;
use crate::entity::{DirectionalLight, Mesh, PointLight, Skybox, Terrain, Transform};
use keel_core::math::{Frustum, Mat4, Ray, Vec3, Vec4};
use keel_core::memory::{FrameVec, LinearAllocator, MemoryError, MemoryTag};
use keel_render::backend::RendererBackend;
use keel_render::types::{GeometryId, GeometryRenderData, MaterialId, SkyboxRef};
use std::collections::HashMap;
use thiserror::Error;

/// Point-light ceiling, matching the per-draw uniform budget. Exceeding it
/// is a content error reported explicitly, never a silent overflow.
pub const MAX_POINT_LIGHTS: usize = 10;

/// Parent chains deeper than this are treated as cyclic.
const MAX_PARENT_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneState {
    Uninitialized,
    Initialized,
    Loading,
    Loaded,
    Unloading,
    Unloaded,
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("operation '{operation}' is invalid in scene state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SceneState,
    },

    #[error("scene supports at most {limit} point lights")]
    TooManyPointLights { limit: usize },

    #[error(transparent)]
    FrameMemory(#[from] MemoryError),
}

/// One ray-query intersection.
#[derive(Debug, Clone, Copy)]
pub struct RayHit {
    pub distance: f32,
    pub instance_id: u32,
    pub geometry: GeometryId,
}

/// Name-keyed scene graph with a load/unload lifecycle.
///
/// Lifecycle: `Uninitialized → Initialized → Loading → Loaded → Unloading →
/// Unloaded → Uninitialized`. GPU-visible resources exist only between
/// `load` and the teardown performed by `update` while unloading.
pub struct Scene {
    state: SceneState,
    config: SceneConfig,
    meshes: HashMap<String, Mesh>,
    terrains: HashMap<String, Terrain>,
    skybox: Option<Skybox>,
    directional_light: Option<DirectionalLight>,
    point_lights: Vec<PointLight>,
    ambient_color: Vec4,
    debug_draw: bool,
}

impl Scene {
    /// Allocate scene-level containers only; no entities, no GPU resources.
    pub fn new(config: SceneConfig) -> Self {
        Self {
            state: SceneState::Uninitialized,
            config,
            meshes: HashMap::new(),
            terrains: HashMap::new(),
            skybox: None,
            directional_light: None,
            point_lights: Vec::new(),
            ambient_color: Vec4::new(0.25, 0.25, 0.25, 1.0),
            debug_draw: false,
        }
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    /// Resolve the configuration into concrete entities and the transform
    /// hierarchy. An entity whose declared parent does not exist logs a
    /// warning and stays root-level.
    pub fn initialize(&mut self) -> Result<(), SceneError> {
        if self.state != SceneState::Uninitialized {
            return Err(SceneError::InvalidState {
                operation: "initialize",
                state: self.state,
            });
        }

        self.ambient_color = Vec4::from_array(self.config.ambient_color);

        let mut next_instance_id = 1u32;
        for mesh_config in &self.config.meshes {
            let mesh = Mesh {
                name: mesh_config.name.clone(),
                parent: mesh_config.parent.clone(),
                transform: Transform::from_config(&mesh_config.transform),
                world_matrix: Mat4::IDENTITY,
                resource: mesh_config.resource.clone(),
                geometry: None,
                material: MaterialId(mesh_config.material),
                transparent: mesh_config.transparent,
                half_extents: Vec3::from_array(mesh_config.half_extents),
                instance_id: next_instance_id,
            };
            next_instance_id += 1;
            self.meshes.insert(mesh.name.clone(), mesh);
        }

        for terrain_config in &self.config.terrains {
            let terrain = Terrain {
                name: terrain_config.name.clone(),
                transform: Transform::from_config(&terrain_config.transform),
                world_matrix: Transform::from_config(&terrain_config.transform).matrix(),
                resource: terrain_config.resource.clone(),
                geometry: None,
                material: MaterialId(terrain_config.material),
                half_extents: Vec3::from_array(terrain_config.half_extents),
                instance_id: next_instance_id,
            };
            next_instance_id += 1;
            self.terrains.insert(terrain.name.clone(), terrain);
        }

        let lights: Vec<PointLight> = self
            .config
            .point_lights
            .iter()
            .map(|light| PointLight {
                color: Vec4::from_array(light.color),
                position: Vec3::from_array(light.position),
                constant: light.constant,
                linear: light.linear,
                quadratic: light.quadratic,
            })
            .collect();
        for light in lights {
            self.add_point_light(light)?;
        }

        self.directional_light =
            self.config
                .directional_light
                .as_ref()
                .map(|light| DirectionalLight {
                    color: Vec4::from_array(light.color),
                    direction: Vec3::from_array(light.direction).normalize(),
                });

        self.skybox = self.config.skybox.as_ref().map(|skybox| Skybox {
            name: skybox.name.clone(),
            resource: skybox.resource.clone(),
            geometry: None,
            material: MaterialId(skybox.material),
        });

        self.resolve_world_matrices();
        self.state = SceneState::Initialized;
        tracing::debug!(
            scene = %self.config.name,
            meshes = self.meshes.len(),
            terrains = self.terrains.len(),
            "scene initialized"
        );
        Ok(())
    }

    /// Register a point light, enforcing [`MAX_POINT_LIGHTS`].
    pub fn add_point_light(&mut self, light: PointLight) -> Result<(), SceneError> {
        if self.point_lights.len() >= MAX_POINT_LIGHTS {
            return Err(SceneError::TooManyPointLights {
                limit: MAX_POINT_LIGHTS,
            });
        }
        self.point_lights.push(light);
        Ok(())
    }

    /// Acquire GPU-visible resources for every entity. A per-entity failure
    /// is logged and that entity skipped; the load itself keeps going.
    pub fn load(&mut self, backend: &mut dyn RendererBackend) -> Result<(), SceneError> {
        if self.state != SceneState::Initialized {
            return Err(SceneError::InvalidState {
                operation: "load",
                state: self.state,
            });
        }
        self.state = SceneState::Loading;

        for mesh in self.meshes.values_mut() {
            match backend.acquire_geometry(&mesh.resource) {
                Ok(id) => mesh.geometry = Some(id),
                Err(error) => {
                    tracing::warn!(mesh = %mesh.name, %error, "mesh load failed, skipping");
                }
            }
        }
        for terrain in self.terrains.values_mut() {
            match backend.acquire_geometry(&terrain.resource) {
                Ok(id) => terrain.geometry = Some(id),
                Err(error) => {
                    tracing::warn!(terrain = %terrain.name, %error, "terrain load failed, skipping");
                }
            }
        }
        if let Some(skybox) = &mut self.skybox {
            match backend.acquire_geometry(&skybox.resource) {
                Ok(id) => skybox.geometry = Some(id),
                Err(error) => {
                    tracing::warn!(skybox = %skybox.name, %error, "skybox load failed, continuing without");
                }
            }
        }

        self.state = SceneState::Loaded;
        Ok(())
    }

    /// Begin teardown; the actual work happens in the next `update`.
    pub fn unload(&mut self) -> Result<(), SceneError> {
        if self.state != SceneState::Loaded {
            return Err(SceneError::InvalidState {
                operation: "unload",
                state: self.state,
            });
        }
        self.state = SceneState::Unloading;
        Ok(())
    }

    /// Per-frame update. Performs deferred teardown while unloading;
    /// otherwise a no-op unless the scene is loaded.
    pub fn update(&mut self) {
        match self.state {
            SceneState::Unloading => {
                for mesh in self.meshes.values_mut() {
                    mesh.geometry = None;
                }
                for terrain in self.terrains.values_mut() {
                    terrain.geometry = None;
                }
                if let Some(skybox) = &mut self.skybox {
                    skybox.geometry = None;
                }
                self.state = SceneState::Unloaded;
            }
            SceneState::Unloaded => {
                self.meshes.clear();
                self.terrains.clear();
                self.skybox = None;
                self.directional_light = None;
                self.point_lights.clear();
                self.state = SceneState::Uninitialized;
            }
            _ => {}
        }
    }

    /// Visible meshes as render data, ordered for correct drawing: opaque
    /// entries ascending by material id (to minimize GPU state changes),
    /// then transparent entries back-to-front. The ordering is a
    /// rendering-correctness requirement for blending and is preserved
    /// exactly by the packet builder.
    pub fn query_meshes<'frame>(
        &self,
        camera_position: Vec3,
        frustum: Option<&Frustum>,
        frame: &'frame LinearAllocator,
    ) -> Result<FrameVec<'frame, GeometryRenderData>, SceneError> {
        let mut out = FrameVec::new_in(frame, MemoryTag::Geometry, self.meshes.len())?;
        if self.state != SceneState::Loaded {
            return Ok(out);
        }
        let mut transparent: FrameVec<(f32, GeometryRenderData)> =
            FrameVec::new_in(frame, MemoryTag::Geometry, self.meshes.len())?;

        for mesh in self.meshes.values() {
            let Some(geometry) = mesh.geometry else {
                continue;
            };
            let bounds = mesh.world_bounds();
            if let Some(frustum) = frustum {
                if !frustum.intersects_aabb(&bounds) {
                    continue;
                }
            }
            let data = GeometryRenderData {
                model: mesh.world_matrix,
                geometry,
                material: mesh.material,
                winding_inverted: mesh.world_matrix.determinant() < 0.0,
                instance_id: mesh.instance_id,
            };
            if mesh.transparent {
                transparent.push((bounds.center().distance(camera_position), data))?;
            } else {
                out.push(data)?;
            }
        }

        out.sort_unstable_by_key(|data| data.material);
        transparent.sort_unstable_by(|a, b| {
            b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal)
        });
        for &(_, data) in transparent.iter() {
            out.push(data)?;
        }
        Ok(out)
    }

    /// Visible terrain chunks; no transparency handling.
    pub fn query_terrains<'frame>(
        &self,
        frustum: Option<&Frustum>,
        frame: &'frame LinearAllocator,
    ) -> Result<FrameVec<'frame, GeometryRenderData>, SceneError> {
        let mut out = FrameVec::new_in(frame, MemoryTag::Geometry, self.terrains.len())?;
        if self.state != SceneState::Loaded {
            return Ok(out);
        }
        for terrain in self.terrains.values() {
            let Some(geometry) = terrain.geometry else {
                continue;
            };
            if let Some(frustum) = frustum {
                if !frustum.intersects_aabb(&terrain.world_bounds()) {
                    continue;
                }
            }
            out.push(GeometryRenderData {
                model: terrain.world_matrix,
                geometry,
                material: terrain.material,
                winding_inverted: false,
                instance_id: terrain.instance_id,
            })?;
        }
        out.sort_unstable_by_key(|data| data.material);
        Ok(out)
    }

    /// Debug bounds visualization, one entry per loaded mesh, drawn with the
    /// default material. Empty unless debug drawing is enabled.
    pub fn query_debug_geometry<'frame>(
        &self,
        frame: &'frame LinearAllocator,
    ) -> Result<FrameVec<'frame, GeometryRenderData>, SceneError> {
        if !self.debug_draw || self.state != SceneState::Loaded {
            return Ok(FrameVec::new_in(frame, MemoryTag::Geometry, 0)?);
        }
        let mut out = FrameVec::new_in(frame, MemoryTag::Geometry, self.meshes.len())?;
        for mesh in self.meshes.values() {
            let Some(geometry) = mesh.geometry else {
                continue;
            };
            out.push(GeometryRenderData {
                model: mesh.world_matrix,
                geometry,
                material: MaterialId(0),
                winding_inverted: false,
                instance_id: mesh.instance_id,
            })?;
        }
        Ok(out)
    }

    /// Meshes intersecting `ray`, nearest first.
    pub fn query_ray<'frame>(
        &self,
        ray: &Ray,
        frame: &'frame LinearAllocator,
    ) -> Result<FrameVec<'frame, RayHit>, SceneError> {
        let mut out = FrameVec::new_in(frame, MemoryTag::Scene, self.meshes.len())?;
        if self.state != SceneState::Loaded {
            return Ok(out);
        }
        for mesh in self.meshes.values() {
            let Some(geometry) = mesh.geometry else {
                continue;
            };
            if let Some(distance) = ray.intersects_aabb(&mesh.world_bounds()) {
                out.push(RayHit {
                    distance,
                    instance_id: mesh.instance_id,
                    geometry,
                })?;
            }
        }
        out.sort_unstable_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(out)
    }

    pub fn ambient_color(&self) -> Vec4 {
        self.ambient_color
    }

    /// Skybox render reference, present only once its geometry is loaded.
    pub fn skybox_ref(&self) -> Option<SkyboxRef> {
        self.skybox.as_ref().and_then(|skybox| {
            skybox.geometry.map(|geometry| SkyboxRef {
                geometry,
                material: skybox.material,
            })
        })
    }

    pub fn directional_light(&self) -> Option<&DirectionalLight> {
        self.directional_light.as_ref()
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn mesh(&self, name: &str) -> Option<&Mesh> {
        self.meshes.get(name)
    }

    pub fn set_debug_draw(&mut self, enabled: bool) {
        self.debug_draw = enabled;
    }

    fn resolve_world_matrices(&mut self) {
        let names: Vec<String> = self.meshes.keys().cloned().collect();
        for name in &names {
            let world = self.world_matrix_of(name, 0);
            if let Some(mesh) = self.meshes.get_mut(name) {
                mesh.world_matrix = world;
            }
        }
    }

    fn world_matrix_of(&self, name: &str, depth: usize) -> Mat4 {
        let mesh = &self.meshes[name];
        let local = mesh.transform.matrix();
        let Some(parent) = &mesh.parent else {
            return local;
        };
        if depth >= MAX_PARENT_DEPTH {
            tracing::warn!(mesh = name, "parent chain too deep or cyclic, using local transform");
            return local;
        }
        if !self.meshes.contains_key(parent) {
            tracing::warn!(
                mesh = name,
                parent = %parent,
                "parent not found, leaving at root level"
            );
            return local;
        }
        self.world_matrix_of(parent, depth + 1) * local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MeshConfig, SceneConfig, SkyboxConfig, TransformConfig};
    use keel_render::backend::HeadlessBackend;
    use keel_metrics::MetricRegistry;
    use std::sync::Arc;

    fn frame_arena() -> LinearAllocator {
        LinearAllocator::new("test.frame", 64 * 1024, Arc::new(MetricRegistry::new())).unwrap()
    }

    fn mesh_at(name: &str, material: u32, transparent: bool, position: [f32; 3]) -> MeshConfig {
        MeshConfig {
            name: name.to_string(),
            resource: format!("mesh.{name}"),
            material,
            transparent,
            transform: TransformConfig {
                position,
                ..TransformConfig::default()
            },
            ..MeshConfig::default()
        }
    }

    fn loaded_scene(config: SceneConfig) -> Scene {
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();
        scene.load(&mut HeadlessBackend::new()).unwrap();
        scene
    }

    #[test]
    fn lifecycle_walks_the_full_state_machine() {
        let mut scene = Scene::new(SceneConfig::default());
        assert_eq!(scene.state(), SceneState::Uninitialized);

        scene.initialize().unwrap();
        assert_eq!(scene.state(), SceneState::Initialized);

        scene.load(&mut HeadlessBackend::new()).unwrap();
        assert_eq!(scene.state(), SceneState::Loaded);

        scene.unload().unwrap();
        assert_eq!(scene.state(), SceneState::Unloading);

        scene.update();
        assert_eq!(scene.state(), SceneState::Unloaded);
        scene.update();
        assert_eq!(scene.state(), SceneState::Uninitialized);

        // The cycle can begin again.
        scene.initialize().unwrap();
        assert_eq!(scene.state(), SceneState::Initialized);
    }

    #[test]
    fn operations_reject_the_wrong_state() {
        let mut scene = Scene::new(SceneConfig::default());
        assert!(matches!(
            scene.load(&mut HeadlessBackend::new()),
            Err(SceneError::InvalidState { .. })
        ));

        scene.initialize().unwrap();
        assert!(matches!(
            scene.initialize(),
            Err(SceneError::InvalidState { .. })
        ));
        assert!(matches!(
            scene.unload(),
            Err(SceneError::InvalidState { .. })
        ));
    }

    #[test]
    fn transparency_ordering_is_opaque_by_material_then_back_to_front() {
        // Two opaque meshes with material ids 2 and 1, one transparent mesh
        // at distance 50 and another at distance 10, camera at the origin.
        let config = SceneConfig {
            meshes: vec![
                mesh_at("opaque_b", 2, false, [1.0, 0.0, 0.0]),
                mesh_at("opaque_a", 1, false, [2.0, 0.0, 0.0]),
                mesh_at("glass_far", 7, true, [0.0, 0.0, -50.0]),
                mesh_at("glass_near", 8, true, [0.0, 0.0, -10.0]),
            ],
            ..SceneConfig::default()
        };
        let scene = loaded_scene(config);

        let frame = frame_arena();
        let result = scene
            .query_meshes(Vec3::ZERO, None, &frame)
            .unwrap();

        let materials: Vec<u32> = result.iter().map(|data| data.material.0).collect();
        assert_eq!(materials, vec![1, 2, 7, 8]);

        // Non-transparent entries precede all transparent entries and the
        // transparent tail is non-increasing by distance to camera.
        let far = scene.mesh("glass_far").unwrap().instance_id;
        let near = scene.mesh("glass_near").unwrap().instance_id;
        assert_eq!(result[2].instance_id, far);
        assert_eq!(result[3].instance_id, near);
    }

    #[test]
    fn frustum_culls_meshes_behind_the_camera() {
        let config = SceneConfig {
            meshes: vec![
                mesh_at("ahead", 1, false, [0.0, 0.0, -10.0]),
                mesh_at("behind", 1, false, [0.0, 0.0, 10.0]),
            ],
            ..SceneConfig::default()
        };
        let scene = loaded_scene(config);

        let projection =
            Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let frustum = Frustum::from_view_projection(projection * view);

        let frame = frame_arena();
        let result = scene
            .query_meshes(Vec3::ZERO, Some(&frustum), &frame)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].instance_id,
            scene.mesh("ahead").unwrap().instance_id
        );
    }

    #[test]
    fn missing_parent_stays_at_root() {
        let config = SceneConfig {
            meshes: vec![MeshConfig {
                parent: Some("does_not_exist".to_string()),
                ..mesh_at("orphan", 1, false, [3.0, 0.0, 0.0])
            }],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();

        let orphan = scene.mesh("orphan").unwrap();
        let position = orphan.world_matrix.transform_point3(Vec3::ZERO);
        assert!((position - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn parented_transforms_compose() {
        let config = SceneConfig {
            meshes: vec![
                mesh_at("parent", 1, false, [1.0, 0.0, 0.0]),
                MeshConfig {
                    parent: Some("parent".to_string()),
                    ..mesh_at("child", 1, false, [0.0, 1.0, 0.0])
                },
            ],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();

        let child = scene.mesh("child").unwrap();
        let position = child.world_matrix.transform_point3(Vec3::ZERO);
        assert!((position - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn failed_entity_load_is_skipped_not_fatal() {
        let config = SceneConfig {
            meshes: vec![
                mesh_at("good", 1, false, [0.0, 0.0, 0.0]),
                mesh_at("broken", 1, false, [1.0, 0.0, 0.0]),
            ],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();

        let mut backend = HeadlessBackend::new();
        backend.fail_acquire.insert("mesh.broken".to_string());
        scene.load(&mut backend).unwrap();
        assert_eq!(scene.state(), SceneState::Loaded);

        let frame = frame_arena();
        let result = scene.query_meshes(Vec3::ZERO, None, &frame).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].instance_id,
            scene.mesh("good").unwrap().instance_id
        );
    }

    #[test]
    fn point_light_limit_is_enforced() {
        let config = SceneConfig {
            point_lights: vec![Default::default(); MAX_POINT_LIGHTS + 1],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        assert!(matches!(
            scene.initialize(),
            Err(SceneError::TooManyPointLights { .. })
        ));
    }

    #[test]
    fn ray_query_returns_hits_nearest_first() {
        let config = SceneConfig {
            meshes: vec![
                mesh_at("far", 1, false, [0.0, 0.0, -30.0]),
                mesh_at("near", 1, false, [0.0, 0.0, -5.0]),
                mesh_at("off_axis", 1, false, [50.0, 0.0, -5.0]),
            ],
            ..SceneConfig::default()
        };
        let scene = loaded_scene(config);

        let frame = frame_arena();
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let hits = scene.query_ray(&ray, &frame).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(
            hits[0].instance_id,
            scene.mesh("near").unwrap().instance_id
        );
        assert!(hits[0].distance < hits[1].distance);
    }

    #[test]
    fn skybox_ref_requires_loaded_geometry() {
        let config = SceneConfig {
            skybox: Some(SkyboxConfig {
                name: "sky".to_string(),
                resource: "cubemap.sky".to_string(),
                material: 4,
            }),
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();
        assert!(scene.skybox_ref().is_none());

        scene.load(&mut HeadlessBackend::new()).unwrap();
        let skybox = scene.skybox_ref().unwrap();
        assert_eq!(skybox.material, MaterialId(4));
    }

    #[test]
    fn queries_on_an_unloaded_scene_are_empty() {
        let config = SceneConfig {
            meshes: vec![mesh_at("cube", 1, false, [0.0; 3])],
            ..SceneConfig::default()
        };
        let mut scene = Scene::new(config);
        scene.initialize().unwrap();

        let frame = frame_arena();
        let result = scene.query_meshes(Vec3::ZERO, None, &frame).unwrap();
        assert!(result.is_empty());
    }
}
