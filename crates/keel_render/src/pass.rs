//! Render passes
//!
//! A closed set of pass kinds sharing one initialize / prepare / execute /
//! destroy contract, dispatched as trait objects. Every pass brackets its
//! GPU work in begin/end: an unterminated pass leaves the command stream
//! inconsistent, so end-of-pass failures escalate instead of being skipped.

use crate::backend::RendererBackend;
use crate::material::MaterialCache;
use crate::types::{
    GeometryRenderData, GlobalUniforms, RenderError, RenderTarget, ShaderId,
};
use crate::view::RenderViewPacket;
use keel_core::frame::FrameData;
use keel_core::math::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Skybox,
    World,
    ShadowMap,
    Ui2d,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            PassKind::Skybox => "skybox",
            PassKind::World => "world",
            PassKind::ShadowMap => "shadow_map",
            PassKind::Ui2d => "ui_2d",
        }
    }
}

pub trait RenderPass {
    fn kind(&self) -> PassKind;

    /// One-time setup: shader acquisition and any pass-owned resources.
    fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError>;

    /// Per-frame bookkeeping before execution. Cheap; no GPU work.
    fn prepare(&mut self, frame: &FrameData, packet: &RenderViewPacket)
        -> Result<(), RenderError>;

    fn execute(
        &mut self,
        frame: &FrameData,
        packet: &RenderViewPacket,
        materials: &MaterialCache,
        target: &RenderTarget,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError>;

    fn destroy(&mut self);
}

fn shader_or_missing(shader: Option<ShaderId>, name: &str) -> Result<ShaderId, RenderError> {
    shader.ok_or_else(|| RenderError::MissingShader {
        name: name.to_string(),
    })
}

/// Draws the scene's skybox, if one is configured, with the view translation
/// stripped so the box follows the camera.
pub struct SkyboxPass {
    shader: Option<ShaderId>,
}

impl SkyboxPass {
    pub fn new() -> Self {
        Self { shader: None }
    }
}

impl Default for SkyboxPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for SkyboxPass {
    fn kind(&self) -> PassKind {
        PassKind::Skybox
    }

    fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError> {
        self.shader = Some(backend.acquire_shader("shader.skybox")?);
        Ok(())
    }

    fn prepare(
        &mut self,
        _frame: &FrameData,
        _packet: &RenderViewPacket,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn execute(
        &mut self,
        frame: &FrameData,
        packet: &RenderViewPacket,
        materials: &MaterialCache,
        target: &RenderTarget,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError> {
        let Some(skybox) = packet.skybox else {
            // No skybox configured; the pass has nothing to render.
            tracing::trace!("skybox pass skipped, none configured");
            return Ok(());
        };
        let shader = shader_or_missing(self.shader, "shader.skybox")?;

        backend.begin_render_pass(PassKind::Skybox, target)?;
        backend.bind_shader(shader)?;

        let mut view = packet.view;
        view.w_axis = Vec4::new(0.0, 0.0, 0.0, 1.0);
        backend.apply_globals(
            shader,
            &GlobalUniforms {
                projection: packet.projection,
                view,
                view_position: Vec3::ZERO,
                ambient_color: packet.ambient_color,
            },
        )?;

        let draw_index = frame.next_draw_index();
        let material = materials.resolve(skybox.material);
        if material.needs_instance_update(frame.frame_number, draw_index) {
            backend.apply_instance(shader, material)?;
            material.mark_updated(frame.frame_number, draw_index);
        }
        backend.draw_geometry(&GeometryRenderData {
            model: Mat4::IDENTITY,
            geometry: skybox.geometry,
            material: skybox.material,
            winding_inverted: false,
            instance_id: 0,
        })?;

        backend.end_render_pass(PassKind::Skybox)
    }

    fn destroy(&mut self) {
        self.shader = None;
    }
}

/// Draws the opaque-then-transparent world geometry, terrain and debug
/// geometry. Relies on the packet sequences already being sorted by the
/// scene queries.
pub struct WorldPass {
    shader: Option<ShaderId>,
}

impl WorldPass {
    pub fn new() -> Self {
        Self { shader: None }
    }
}

impl Default for WorldPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for WorldPass {
    fn kind(&self) -> PassKind {
        PassKind::World
    }

    fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError> {
        self.shader = Some(backend.acquire_shader("shader.world")?);
        Ok(())
    }

    fn prepare(
        &mut self,
        _frame: &FrameData,
        packet: &RenderViewPacket,
    ) -> Result<(), RenderError> {
        tracing::trace!(
            geometries = packet.geometries.len(),
            terrain = packet.terrain.len(),
            "world pass prepared"
        );
        Ok(())
    }

    fn execute(
        &mut self,
        frame: &FrameData,
        packet: &RenderViewPacket,
        materials: &MaterialCache,
        target: &RenderTarget,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError> {
        let shader = shader_or_missing(self.shader, "shader.world")?;

        backend.begin_render_pass(PassKind::World, target)?;
        backend.bind_shader(shader)?;
        backend.apply_globals(
            shader,
            &GlobalUniforms {
                projection: packet.projection,
                view: packet.view,
                view_position: packet.view_position,
                ambient_color: packet.ambient_color,
            },
        )?;

        let draw_index = frame.next_draw_index();
        for data in packet.geometries.iter().chain(packet.terrain.iter()) {
            let material = materials.resolve(data.material);
            if material.needs_instance_update(frame.frame_number, draw_index) {
                // One bad material must not abort the whole pass.
                if let Err(error) = backend.apply_instance(shader, material) {
                    tracing::warn!(
                        material = %material.name,
                        %error,
                        "instance state failed, skipping geometry"
                    );
                    continue;
                }
                material.mark_updated(frame.frame_number, draw_index);
            }
            backend.apply_local(shader, &data.model)?;
            backend.draw_geometry(data)?;
        }

        // Debug geometry carries no material state of its own.
        for data in packet.debug_geometry.iter() {
            backend.apply_local(shader, &data.model)?;
            backend.draw_geometry(data)?;
        }

        backend.end_render_pass(PassKind::World)
    }

    fn destroy(&mut self) {
        self.shader = None;
    }
}

/// Depth-only pass over the world geometry from the light's point of view.
pub struct ShadowMapPass {
    shader: Option<ShaderId>,
}

impl ShadowMapPass {
    pub fn new() -> Self {
        Self { shader: None }
    }
}

impl Default for ShadowMapPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for ShadowMapPass {
    fn kind(&self) -> PassKind {
        PassKind::ShadowMap
    }

    fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError> {
        self.shader = Some(backend.acquire_shader("shader.shadow")?);
        Ok(())
    }

    fn prepare(
        &mut self,
        _frame: &FrameData,
        _packet: &RenderViewPacket,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn execute(
        &mut self,
        frame: &FrameData,
        packet: &RenderViewPacket,
        _materials: &MaterialCache,
        target: &RenderTarget,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError> {
        let shader = shader_or_missing(self.shader, "shader.shadow")?;
        let _ = frame.next_draw_index();

        backend.begin_render_pass(PassKind::ShadowMap, target)?;
        backend.bind_shader(shader)?;
        backend.apply_globals(
            shader,
            &GlobalUniforms {
                projection: packet.projection,
                view: packet.view,
                view_position: packet.view_position,
                ambient_color: packet.ambient_color,
            },
        )?;

        // Depth only: no per-instance material state.
        for data in packet.geometries.iter().chain(packet.terrain.iter()) {
            backend.apply_local(shader, &data.model)?;
            backend.draw_geometry(data)?;
        }

        backend.end_render_pass(PassKind::ShadowMap)
    }

    fn destroy(&mut self) {
        self.shader = None;
    }
}

/// 2D overlay pass. Widget rendering lives outside the engine core; the
/// pass keeps the target's begin/bind/globals/end contract so an overlay
/// renderer can hook in.
pub struct Ui2dPass {
    shader: Option<ShaderId>,
}

impl Ui2dPass {
    pub fn new() -> Self {
        Self { shader: None }
    }
}

impl Default for Ui2dPass {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderPass for Ui2dPass {
    fn kind(&self) -> PassKind {
        PassKind::Ui2d
    }

    fn initialize(&mut self, backend: &mut dyn RendererBackend) -> Result<(), RenderError> {
        self.shader = Some(backend.acquire_shader("shader.ui")?);
        Ok(())
    }

    fn prepare(
        &mut self,
        _frame: &FrameData,
        _packet: &RenderViewPacket,
    ) -> Result<(), RenderError> {
        Ok(())
    }

    fn execute(
        &mut self,
        frame: &FrameData,
        _packet: &RenderViewPacket,
        _materials: &MaterialCache,
        target: &RenderTarget,
        backend: &mut dyn RendererBackend,
    ) -> Result<(), RenderError> {
        let shader = shader_or_missing(self.shader, "shader.ui")?;
        let _ = frame.next_draw_index();

        backend.begin_render_pass(PassKind::Ui2d, target)?;
        backend.bind_shader(shader)?;
        backend.apply_globals(
            shader,
            &GlobalUniforms {
                projection: Mat4::orthographic_rh(
                    0.0,
                    target.width as f32,
                    target.height as f32,
                    0.0,
                    -1.0,
                    1.0,
                ),
                view: Mat4::IDENTITY,
                view_position: Vec3::ZERO,
                ambient_color: Vec4::ONE,
            },
        )?;
        backend.end_render_pass(PassKind::Ui2d)
    }

    fn destroy(&mut self) {
        self.shader = None;
    }
}
