//! Render view: packet building and pass execution
//!
//! The view owns the configured pass chain. Each frame it assembles a
//! [`RenderViewPacket`] out of the scene's (already sorted) query output and
//! then executes the passes against it. Packet sequences live in the frame
//! allocator and are reclaimed wholesale by the next frame's reset.

use crate::backend::RendererBackend;
use crate::material::MaterialCache;
use crate::pass::{RenderPass, ShadowMapPass, SkyboxPass, Ui2dPass, WorldPass};
use crate::types::{GeometryRenderData, RenderError, RenderTarget, SkyboxRef};
use keel_core::frame::FrameData;
use keel_core::math::{Mat4, Vec3, Vec4};
use keel_core::memory::FrameVec;

/// View matrices plus the world position they were derived from.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub view: Mat4,
}

impl Camera {
    pub fn look_at(position: Vec3, target: Vec3, up: Vec3) -> Self {
        Self {
            position,
            view: Mat4::look_at_rh(position, target, up),
        }
    }
}

/// Output region plus the projection used to render into it.
#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub projection: Mat4,
}

impl Viewport {
    pub fn perspective(width: u32, height: u32, fov_y: f32, near: f32, far: f32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            width,
            height,
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
        }
    }
}

/// The scene-side inputs to packet building: query output sequences (already
/// sorted) plus scene-level render state.
pub struct WorldRenderData<'frame> {
    pub geometries: FrameVec<'frame, GeometryRenderData>,
    pub terrain: FrameVec<'frame, GeometryRenderData>,
    pub debug_geometry: FrameVec<'frame, GeometryRenderData>,
    pub skybox: Option<SkyboxRef>,
    pub ambient_color: Vec4,
}

/// Frame-transient bundle consumed by pass execution. Constructed fresh
/// every frame; never freed individually.
pub struct RenderViewPacket<'frame> {
    pub projection: Mat4,
    pub view: Mat4,
    pub view_position: Vec3,
    pub ambient_color: Vec4,
    pub geometries: FrameVec<'frame, GeometryRenderData>,
    pub terrain: FrameVec<'frame, GeometryRenderData>,
    pub debug_geometry: FrameVec<'frame, GeometryRenderData>,
    pub skybox: Option<SkyboxRef>,
}

pub struct RenderView {
    passes: Vec<Box<dyn RenderPass>>,
    render_failure_logged: bool,
}

impl RenderView {
    pub fn new(passes: Vec<Box<dyn RenderPass>>) -> Self {
        Self {
            passes,
            render_failure_logged: false,
        }
    }

    /// Standard chain: shadow map, skybox, world, 2D overlay.
    pub fn with_standard_passes() -> Self {
        Self::new(vec![
            Box::new(ShadowMapPass::new()),
            Box::new(SkyboxPass::new()),
            Box::new(WorldPass::new()),
            Box::new(Ui2dPass::new()),
        ])
    }

    pub fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError> {
        for pass in &mut self.passes {
            pass.initialize(backend)?;
            tracing::debug!(pass = pass.kind().name(), "render pass initialized");
        }
        Ok(())
    }

    /// Derive the per-frame packet from camera, viewport and scene data.
    ///
    /// The geometry sequences are moved in as-is: ordering (opaque by
    /// material, transparent back-to-front appended last) is established by
    /// the scene queries and preserved exactly.
    pub fn build_packet<'frame>(
        &self,
        frame: &FrameData<'frame>,
        viewport: &Viewport,
        camera: &Camera,
        world: WorldRenderData<'frame>,
    ) -> Result<RenderViewPacket<'frame>, RenderError> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(RenderError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        tracing::trace!(
            frame = frame.frame_number,
            geometries = world.geometries.len(),
            terrain = world.terrain.len(),
            "building render packet"
        );
        Ok(RenderViewPacket {
            projection: viewport.projection,
            view: camera.view,
            view_position: camera.position,
            ambient_color: world.ambient_color,
            geometries: world.geometries,
            terrain: world.terrain,
            debug_geometry: world.debug_geometry,
            skybox: world.skybox,
        })
    }

    /// Execute every configured pass against the packet.
    ///
    /// A failure aborts this frame's render but not the process; it is
    /// logged once, not re-spammed while the failure persists, and the next
    /// frame gets a fresh attempt.
    pub fn render(
        &mut self,
        frame: &FrameData,
        packet: &RenderViewPacket,
        materials: &MaterialCache,
        viewport: &Viewport,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError> {
        let target = RenderTarget {
            index: frame.render_target_index,
            width: viewport.width,
            height: viewport.height,
        };

        for pass in &mut self.passes {
            pass.prepare(frame, packet)?;
            if let Err(error) = pass.execute(frame, packet, materials, &target, backend) {
                if !self.render_failure_logged {
                    tracing::error!(
                        pass = pass.kind().name(),
                        %error,
                        "render pass failed, aborting frame"
                    );
                    self.render_failure_logged = true;
                }
                return Err(error);
            }
        }

        if self.render_failure_logged {
            tracing::info!("rendering recovered");
            self.render_failure_logged = false;
        }
        Ok(())
    }

    pub fn destroy(&mut self) {
        for pass in &mut self.passes {
            pass.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, HeadlessBackend};
    use crate::material::{Material, MaterialCache, DEFAULT_MATERIAL_ID};
    use crate::pass::PassKind;
    use crate::types::{GeometryId, MaterialId, ShaderId};
    use keel_core::memory::{LinearAllocator, MemoryTag};
    use keel_metrics::MetricRegistry;
    use std::sync::Arc;

    fn frame_arena() -> LinearAllocator {
        LinearAllocator::new("test.frame", 64 * 1024, Arc::new(MetricRegistry::new())).unwrap()
    }

    fn geometry(geometry: u32, material: u32) -> GeometryRenderData {
        GeometryRenderData {
            model: Mat4::IDENTITY,
            geometry: GeometryId(geometry),
            material: MaterialId(material),
            winding_inverted: false,
            instance_id: geometry,
        }
    }

    fn world_data<'f>(
        arena: &'f LinearAllocator,
        geometries: &[GeometryRenderData],
        skybox: Option<SkyboxRef>,
    ) -> WorldRenderData<'f> {
        let mut list = FrameVec::new_in(arena, MemoryTag::Renderer, 16).unwrap();
        list.extend_from_slice(geometries).unwrap();
        WorldRenderData {
            geometries: list,
            terrain: FrameVec::new_in(arena, MemoryTag::Renderer, 4).unwrap(),
            debug_geometry: FrameVec::new_in(arena, MemoryTag::Renderer, 4).unwrap(),
            skybox,
            ambient_color: Vec4::new(0.25, 0.25, 0.25, 1.0),
        }
    }

    fn materials_with(ids: &[u32]) -> MaterialCache {
        let mut cache = MaterialCache::new(ShaderId(100));
        for &id in ids {
            cache.insert(Material::new(
                MaterialId(id),
                format!("material.{id}"),
                ShaderId(100),
                Vec4::ONE,
                false,
            ));
        }
        cache
    }

    fn viewport() -> Viewport {
        Viewport::perspective(1280, 720, std::f32::consts::FRAC_PI_3, 0.1, 1000.0)
    }

    fn camera() -> Camera {
        Camera::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y)
    }

    #[test]
    fn build_packet_rejects_degenerate_viewport() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let view = RenderView::new(vec![Box::new(WorldPass::new())]);
        let bad = Viewport::perspective(0, 720, 1.0, 0.1, 10.0);

        let result = view.build_packet(&frame, &bad, &camera(), world_data(&arena, &[], None));
        assert!(matches!(
            result,
            Err(RenderError::InvalidViewport { width: 0, .. })
        ));
    }

    #[test]
    fn passes_run_in_configured_order_with_full_contract() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![
            Box::new(SkyboxPass::new()),
            Box::new(WorldPass::new()),
        ]);
        view.initialize(&mut backend).unwrap();

        let skybox = SkyboxRef {
            geometry: GeometryId(9),
            material: MaterialId(5),
        };
        let materials = materials_with(&[1, 5]);
        let world = world_data(&arena, &[geometry(1, 1)], Some(skybox));
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        view.render(&frame, &packet, &materials, &viewport(), &mut backend)
            .unwrap();

        let calls = backend.calls();
        let begins: Vec<_> = calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::BeginPass(kind) => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(begins, vec![PassKind::Skybox, PassKind::World]);

        // Each pass is begin, bind, globals ... end, in that order.
        let world_begin = calls
            .iter()
            .position(|c| *c == BackendCall::BeginPass(PassKind::World))
            .unwrap();
        assert!(matches!(calls[world_begin + 1], BackendCall::BindShader(_)));
        assert!(matches!(calls[world_begin + 2], BackendCall::ApplyGlobals(_)));
        assert_eq!(*calls.last().unwrap(), BackendCall::EndPass(PassKind::World));
        assert!(calls.contains(&BackendCall::Draw(GeometryId(9), MaterialId(5))));
        assert!(calls.contains(&BackendCall::Draw(GeometryId(1), MaterialId(1))));
    }

    #[test]
    fn consecutive_draws_sharing_a_material_upload_instance_state_once() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 7);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![Box::new(WorldPass::new())]);
        view.initialize(&mut backend).unwrap();

        let materials = materials_with(&[3]);
        let world = world_data(
            &arena,
            &[geometry(1, 3), geometry(2, 3), geometry(3, 3)],
            None,
        );
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        view.render(&frame, &packet, &materials, &viewport(), &mut backend)
            .unwrap();

        let instance_applies = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::ApplyInstance(MaterialId(3))))
            .count();
        assert_eq!(instance_applies, 1);
        let draws = backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Draw(..)))
            .count();
        assert_eq!(draws, 3);
    }

    #[test]
    fn unknown_material_falls_back_to_default() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![Box::new(WorldPass::new())]);
        view.initialize(&mut backend).unwrap();

        let materials = MaterialCache::new(ShaderId(100));
        let world = world_data(&arena, &[geometry(1, 42)], None);
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        view.render(&frame, &packet, &materials, &viewport(), &mut backend)
            .unwrap();

        assert!(backend
            .calls()
            .contains(&BackendCall::ApplyInstance(DEFAULT_MATERIAL_ID)));
    }

    #[test]
    fn bad_material_skips_its_geometry_but_not_the_pass() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![Box::new(WorldPass::new())]);
        view.initialize(&mut backend).unwrap();
        backend.fail_instance_for.insert(MaterialId(1));

        let materials = materials_with(&[1, 2]);
        let world = world_data(&arena, &[geometry(1, 1), geometry(2, 2)], None);
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        view.render(&frame, &packet, &materials, &viewport(), &mut backend)
            .unwrap();

        let calls = backend.calls();
        assert!(!calls.contains(&BackendCall::Draw(GeometryId(1), MaterialId(1))));
        assert!(calls.contains(&BackendCall::Draw(GeometryId(2), MaterialId(2))));
        assert_eq!(*calls.last().unwrap(), BackendCall::EndPass(PassKind::World));
    }

    #[test]
    fn end_pass_failure_aborts_the_frame() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![Box::new(WorldPass::new())]);
        view.initialize(&mut backend).unwrap();
        backend.fail_end_pass = Some(PassKind::World);

        let materials = materials_with(&[1]);
        let world = world_data(&arena, &[geometry(1, 1)], None);
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        let result = view.render(&frame, &packet, &materials, &viewport(), &mut backend);
        assert!(matches!(result, Err(RenderError::Backend { .. })));
    }

    #[test]
    fn missing_skybox_skips_the_pass_entirely() {
        let arena = frame_arena();
        let frame = FrameData::new(&arena, 1);
        let mut backend = HeadlessBackend::new();
        let mut view = RenderView::new(vec![Box::new(SkyboxPass::new())]);
        view.initialize(&mut backend).unwrap();

        let materials = MaterialCache::new(ShaderId(100));
        let world = world_data(&arena, &[], None);
        let packet = view
            .build_packet(&frame, &viewport(), &camera(), world)
            .unwrap();
        view.render(&frame, &packet, &materials, &viewport(), &mut backend)
            .unwrap();

        assert!(backend.calls().is_empty());
    }
}
