//! Math utilities
//!
//! Re-exports glam plus the culling primitives the scene queries use.

pub use glam::*;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_center_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Plane in the form `normal · p + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    fn from_coefficients(coeffs: Vec4) -> Self {
        let normal = coeffs.truncate();
        let magnitude = normal.length();
        Self {
            normal: normal / magnitude,
            d: coeffs.w / magnitude,
        }
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// View frustum as six inward-facing planes, extracted from a combined
/// view-projection matrix (Gribb-Hartmann).
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_projection(view_projection: Mat4) -> Self {
        let r0 = view_projection.row(0);
        let r1 = view_projection.row(1);
        let r2 = view_projection.row(2);
        let r3 = view_projection.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0), // left
                Plane::from_coefficients(r3 - r0), // right
                Plane::from_coefficients(r3 + r1), // bottom
                Plane::from_coefficients(r3 - r1), // top
                Plane::from_coefficients(r3 + r2), // near
                Plane::from_coefficients(r3 - r2), // far
            ],
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(point) >= 0.0)
    }

    /// Conservative AABB test: the box is culled only when it is fully
    /// outside one plane.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            // Corner of the box furthest along the plane normal.
            let positive = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.signed_distance(positive) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Ray with a normalized direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Slab test. Returns the distance to the nearest intersection, or
    /// `None` when the ray misses.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<f32> {
        let inv = self.direction.recip();
        let t1 = (aabb.min - self.origin) * inv;
        let t2 = (aabb.max - self.origin) * inv;

        let t_min = t1.min(t2);
        let t_max = t1.max(t2);

        let near = t_min.max_element();
        let far = t_max.min_element();

        if near > far || far < 0.0 {
            return None;
        }
        Some(if near >= 0.0 { near } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_down_negative_z() -> Frustum {
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        Frustum::from_view_projection(projection * view)
    }

    #[test]
    fn frustum_keeps_visible_boxes_and_culls_behind() {
        let frustum = look_down_negative_z();

        let ahead = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::splat(1.0));
        let behind = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::splat(1.0));

        assert!(frustum.intersects_aabb(&ahead));
        assert!(!frustum.intersects_aabb(&behind));
    }

    #[test]
    fn frustum_point_containment() {
        let frustum = look_down_negative_z();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn ray_hits_box_at_expected_distance() {
        let ray = Ray::new(Vec3::ZERO, Vec3::NEG_Z);
        let aabb = Aabb::from_center_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::splat(1.0));
        let distance = ray.intersects_aabb(&aabb).unwrap();
        assert!((distance - 9.0).abs() < 1e-5);

        let miss = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(miss.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn ray_starting_inside_reports_zero() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let aabb = Aabb::from_center_extents(Vec3::ZERO, Vec3::splat(2.0));
        assert_eq!(ray.intersects_aabb(&aabb), Some(0.0));
    }
}
