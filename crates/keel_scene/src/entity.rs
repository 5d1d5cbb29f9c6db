//! Scene entities

use crate::config::TransformConfig;
use keel_core::math::{Aabb, EulerRot, Mat4, Quat, Vec3, Vec4};
use keel_render::types::{GeometryId, MaterialId};

/// Local-space transform resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    pub fn from_config(config: &TransformConfig) -> Self {
        Self {
            position: Vec3::from_array(config.position),
            rotation: Quat::from_euler(
                EulerRot::XYZ,
                config.rotation[0],
                config.rotation[1],
                config.rotation[2],
            ),
            scale: Vec3::from_array(config.scale),
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Renderable mesh entity. `geometry` stays `None` until the scene load
/// acquires backend resources; unloaded or load-failed meshes are excluded
/// from queries.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub parent: Option<String>,
    pub transform: Transform,
    pub world_matrix: Mat4,
    pub resource: String,
    pub geometry: Option<GeometryId>,
    pub material: MaterialId,
    pub transparent: bool,
    pub half_extents: Vec3,
    pub instance_id: u32,
}

impl Mesh {
    /// World-space bounds, conservatively scaled by the world matrix.
    pub fn world_bounds(&self) -> Aabb {
        let center = self.world_matrix.transform_point3(Vec3::ZERO);
        let scale = Vec3::new(
            self.world_matrix.x_axis.truncate().length(),
            self.world_matrix.y_axis.truncate().length(),
            self.world_matrix.z_axis.truncate().length(),
        );
        Aabb::from_center_extents(center, self.half_extents * scale)
    }
}

/// Terrain chunk. Not parented; terrain lives at root level.
#[derive(Debug, Clone)]
pub struct Terrain {
    pub name: String,
    pub transform: Transform,
    pub world_matrix: Mat4,
    pub resource: String,
    pub geometry: Option<GeometryId>,
    pub material: MaterialId,
    pub half_extents: Vec3,
    pub instance_id: u32,
}

impl Terrain {
    pub fn world_bounds(&self) -> Aabb {
        let center = self.world_matrix.transform_point3(Vec3::ZERO);
        Aabb::from_center_extents(center, self.half_extents)
    }
}

#[derive(Debug, Clone)]
pub struct Skybox {
    pub name: String,
    pub resource: String,
    pub geometry: Option<GeometryId>,
    pub material: MaterialId,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub color: Vec4,
    pub direction: Vec3,
}

#[derive(Debug, Clone, Copy)]
pub struct PointLight {
    pub color: Vec4,
    pub position: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_matrix_applies_translation() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            ..Transform::default()
        };
        let point = transform.matrix().transform_point3(Vec3::ZERO);
        assert!((point - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-6);
    }

    #[test]
    fn world_bounds_follow_the_world_matrix() {
        let mesh = Mesh {
            name: "m".into(),
            parent: None,
            transform: Transform::default(),
            world_matrix: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            resource: String::new(),
            geometry: None,
            material: MaterialId(0),
            transparent: false,
            half_extents: Vec3::splat(1.0),
            instance_id: 0,
        };
        let bounds = mesh.world_bounds();
        assert!(bounds.contains_point(Vec3::new(10.0, 0.0, 0.0)));
        assert!(!bounds.contains_point(Vec3::ZERO));
    }
}
