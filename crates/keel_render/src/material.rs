//! Materials and the material cache

use crate::types::{MaterialId, ShaderId};
use keel_core::math::Vec4;
use std::cell::Cell;
use std::collections::HashMap;

/// Id of the guaranteed fallback material.
pub const DEFAULT_MATERIAL_ID: MaterialId = MaterialId(0);

/// Surface description bound per draw. The frame/draw stamps let pass
/// execution skip re-uploading instance uniforms that were already applied
/// for the current frame and draw pass.
#[derive(Debug)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub shader: ShaderId,
    pub diffuse_color: Vec4,
    pub has_transparency: bool,
    render_frame_number: Cell<u64>,
    render_draw_index: Cell<u64>,
}

impl Material {
    pub fn new(
        id: MaterialId,
        name: impl Into<String>,
        shader: ShaderId,
        diffuse_color: Vec4,
        has_transparency: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            shader,
            diffuse_color,
            has_transparency,
            render_frame_number: Cell::new(u64::MAX),
            render_draw_index: Cell::new(u64::MAX),
        }
    }

    /// Whether instance uniforms still need applying for this frame/draw.
    /// Purely a bandwidth optimization; skipping it never changes output.
    pub fn needs_instance_update(&self, frame_number: u64, draw_index: u64) -> bool {
        self.render_frame_number.get() != frame_number
            || self.render_draw_index.get() != draw_index
    }

    pub fn mark_updated(&self, frame_number: u64, draw_index: u64) {
        self.render_frame_number.set(frame_number);
        self.render_draw_index.set(draw_index);
    }
}

/// Material storage with a guaranteed default fallback.
pub struct MaterialCache {
    materials: HashMap<MaterialId, Material>,
}

impl MaterialCache {
    /// The cache always contains a default material bound to `default_shader`.
    pub fn new(default_shader: ShaderId) -> Self {
        let mut materials = HashMap::new();
        materials.insert(
            DEFAULT_MATERIAL_ID,
            Material::new(
                DEFAULT_MATERIAL_ID,
                "material.default",
                default_shader,
                Vec4::ONE,
                false,
            ),
        );
        Self { materials }
    }

    pub fn insert(&mut self, material: Material) {
        self.materials.insert(material.id, material);
    }

    /// Resolve an id, falling back to the default material when unknown.
    pub fn resolve(&self, id: MaterialId) -> &Material {
        self.materials.get(&id).unwrap_or_else(|| {
            tracing::debug!(material = id.0, "unknown material, using default");
            &self.materials[&DEFAULT_MATERIAL_ID]
        })
    }

    pub fn default_material(&self) -> &Material {
        &self.materials[&DEFAULT_MATERIAL_ID]
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_resolve_to_the_default() {
        let cache = MaterialCache::new(ShaderId(1));
        let material = cache.resolve(MaterialId(99));
        assert_eq!(material.id, DEFAULT_MATERIAL_ID);
    }

    #[test]
    fn stamps_deduplicate_within_a_draw() {
        let material = Material::new(MaterialId(1), "m", ShaderId(1), Vec4::ONE, false);
        assert!(material.needs_instance_update(5, 0));
        material.mark_updated(5, 0);
        assert!(!material.needs_instance_update(5, 0));
        // Next pass bumps the draw index, forcing a re-apply.
        assert!(material.needs_instance_update(5, 1));
        // So does the next frame.
        assert!(material.needs_instance_update(6, 0));
    }
}
