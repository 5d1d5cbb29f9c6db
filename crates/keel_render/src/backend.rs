//! Renderer backend abstraction
//!
//! The GPU is an opaque sink behind [`RendererBackend`]: the core calls
//! these operations but never implements them. Implementations fail loudly
//! and never partially apply state. [`HeadlessBackend`] records the call
//! stream for tests and for running the engine without a GPU.

use crate::material::Material;
use crate::pass::PassKind;
use crate::types::{
    GeometryId, GeometryRenderData, GlobalUniforms, MaterialId, RenderError, RenderTarget,
    ShaderId,
};
use keel_core::math::Mat4;
use std::collections::HashSet;

pub trait RendererBackend {
    fn begin_render_pass(&mut self, pass: PassKind, target: &RenderTarget)
        -> Result<(), RenderError>;
    fn end_render_pass(&mut self, pass: PassKind) -> Result<(), RenderError>;

    fn bind_shader(&mut self, shader: ShaderId) -> Result<(), RenderError>;
    fn apply_globals(&mut self, shader: ShaderId, globals: &GlobalUniforms)
        -> Result<(), RenderError>;
    fn apply_instance(&mut self, shader: ShaderId, material: &Material)
        -> Result<(), RenderError>;
    fn apply_local(&mut self, shader: ShaderId, model: &Mat4) -> Result<(), RenderError>;

    fn draw_geometry(&mut self, data: &GeometryRenderData) -> Result<(), RenderError>;
    fn present(&mut self) -> Result<(), RenderError>;

    /// Load-time resource acquisition; called once at scene load, never per
    /// frame.
    fn acquire_geometry(&mut self, name: &str) -> Result<GeometryId, RenderError>;
    fn acquire_shader(&mut self, name: &str) -> Result<ShaderId, RenderError>;
}

/// One recorded backend operation.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    BeginPass(PassKind),
    EndPass(PassKind),
    BindShader(ShaderId),
    ApplyGlobals(ShaderId),
    ApplyInstance(MaterialId),
    ApplyLocal(ShaderId),
    Draw(GeometryId, MaterialId),
    Present,
}

/// Backend that records every call instead of talking to a GPU.
///
/// Failure injection covers the error paths the pipeline must survive:
/// per-material instance-state failures and end-of-pass failures.
pub struct HeadlessBackend {
    calls: Vec<BackendCall>,
    next_geometry: u32,
    next_shader: u32,
    pub fail_instance_for: HashSet<MaterialId>,
    pub fail_end_pass: Option<PassKind>,
    pub fail_acquire: HashSet<String>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_geometry: 1,
            next_shader: 1,
            fail_instance_for: HashSet::new(),
            fail_end_pass: None,
            fail_acquire: HashSet::new(),
        }
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererBackend for HeadlessBackend {
    fn begin_render_pass(
        &mut self,
        pass: PassKind,
        _target: &RenderTarget,
    ) -> Result<(), RenderError> {
        self.calls.push(BackendCall::BeginPass(pass));
        Ok(())
    }

    fn end_render_pass(&mut self, pass: PassKind) -> Result<(), RenderError> {
        if self.fail_end_pass == Some(pass) {
            return Err(RenderError::Backend {
                operation: "end_render_pass",
                detail: format!("injected failure for {} pass", pass.name()),
            });
        }
        self.calls.push(BackendCall::EndPass(pass));
        Ok(())
    }

    fn bind_shader(&mut self, shader: ShaderId) -> Result<(), RenderError> {
        self.calls.push(BackendCall::BindShader(shader));
        Ok(())
    }

    fn apply_globals(
        &mut self,
        shader: ShaderId,
        _globals: &GlobalUniforms,
    ) -> Result<(), RenderError> {
        self.calls.push(BackendCall::ApplyGlobals(shader));
        Ok(())
    }

    fn apply_instance(&mut self, _shader: ShaderId, material: &Material)
        -> Result<(), RenderError> {
        if self.fail_instance_for.contains(&material.id) {
            return Err(RenderError::Backend {
                operation: "apply_instance",
                detail: format!("injected failure for material '{}'", material.name),
            });
        }
        self.calls.push(BackendCall::ApplyInstance(material.id));
        Ok(())
    }

    fn apply_local(&mut self, shader: ShaderId, _model: &Mat4) -> Result<(), RenderError> {
        self.calls.push(BackendCall::ApplyLocal(shader));
        Ok(())
    }

    fn draw_geometry(&mut self, data: &GeometryRenderData) -> Result<(), RenderError> {
        self.calls
            .push(BackendCall::Draw(data.geometry, data.material));
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.calls.push(BackendCall::Present);
        Ok(())
    }

    fn acquire_geometry(&mut self, name: &str) -> Result<GeometryId, RenderError> {
        if self.fail_acquire.contains(name) {
            return Err(RenderError::Backend {
                operation: "acquire_geometry",
                detail: format!("injected failure for resource '{name}'"),
            });
        }
        let id = GeometryId(self.next_geometry);
        self.next_geometry += 1;
        Ok(id)
    }

    fn acquire_shader(&mut self, name: &str) -> Result<ShaderId, RenderError> {
        if self.fail_acquire.contains(name) {
            return Err(RenderError::MissingShader {
                name: name.to_string(),
            });
        }
        let id = ShaderId(self.next_shader);
        self.next_shader += 1;
        Ok(id)
    }
}
