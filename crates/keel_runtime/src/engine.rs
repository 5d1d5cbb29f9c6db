//! Engine runtime: context wiring and the frame loop
//!
//! Frame ordering is strict: reset the frame arena, update the scene, run
//! the queries, build the packet, execute the passes, present. The arena
//! reset happens at the *top* of the frame, not the bottom, so deferred
//! consumers of the previous frame's packet are always done before their
//! memory is reclaimed.

use crate::config::RuntimeConfig;
use keel_core::context::EngineContext;
use keel_core::event::EngineEvent;
use keel_core::frame::FrameData;
use keel_core::math::{Frustum, Vec3};
use keel_core::time::FrameClock;
use keel_render::{Camera, MaterialCache, RenderView, RendererBackend, Viewport, WorldRenderData};
use keel_scene::{MeshConfig, Scene, SceneConfig, SceneState, SkyboxConfig, TransformConfig};

pub struct Engine {
    ctx: EngineContext,
    scene: Scene,
    view: RenderView,
    materials: MaterialCache,
    backend: Box<dyn RendererBackend>,
    camera: Camera,
    viewport: Viewport,
    clock: FrameClock,
    frame_number: u64,
}

impl Engine {
    pub fn new(
        config: &RuntimeConfig,
        mut backend: Box<dyn RendererBackend>,
        scene_config: SceneConfig,
    ) -> anyhow::Result<Self> {
        let ctx = EngineContext::new(&config.memory)?;

        let mut view = RenderView::with_standard_passes();
        view.initialize(backend.as_mut())?;

        let default_shader = backend.acquire_shader("shader.material_default")?;
        let materials = MaterialCache::new(default_shader);

        let mut scene = Scene::new(scene_config);
        scene.initialize()?;
        scene.load(backend.as_mut())?;

        let camera = Camera::look_at(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y);
        let viewport = Viewport::perspective(
            config.window_width,
            config.window_height,
            std::f32::consts::FRAC_PI_3,
            0.1,
            1000.0,
        );

        Ok(Self {
            ctx,
            scene,
            view,
            materials,
            backend,
            camera,
            viewport,
            clock: FrameClock::new(120),
            frame_number: 0,
        })
    }

    /// Run the frame loop until a quit event or the frame cap (0 = no cap).
    pub fn run(&mut self, max_frames: u64) -> anyhow::Result<()> {
        tracing::info!(max_frames, "entering frame loop");
        loop {
            if max_frames > 0 && self.frame_number >= max_frames {
                break;
            }
            if !self.run_frame()? {
                break;
            }
        }
        tracing::info!(
            frames = self.frame_number,
            fps = self.clock.fps(),
            "frame loop finished"
        );
        Ok(())
    }

    /// One frame iteration. Returns `false` when a quit event was drained.
    fn run_frame(&mut self) -> anyhow::Result<bool> {
        // Top-of-frame reset reclaims the previous frame's packet and query
        // output en masse.
        self.ctx.frame_allocator.reset();
        let delta = self.clock.tick();
        self.frame_number += 1;

        self.scene.update();

        let mut frame = FrameData::new(&self.ctx.frame_allocator, self.frame_number);
        frame.delta_time = delta;
        frame.total_time = self.clock.total();
        frame.average_frame_ms = self.clock.average_frame_ms();

        let frustum = Frustum::from_view_projection(self.viewport.projection * self.camera.view);
        let geometries =
            self.scene
                .query_meshes(self.camera.position, Some(&frustum), frame.allocator)?;
        let terrain = self.scene.query_terrains(Some(&frustum), frame.allocator)?;
        let debug_geometry = self.scene.query_debug_geometry(frame.allocator)?;

        let world = WorldRenderData {
            geometries,
            terrain,
            debug_geometry,
            skybox: self.scene.skybox_ref(),
            ambient_color: self.scene.ambient_color(),
        };
        let packet = self
            .view
            .build_packet(&frame, &self.viewport, &self.camera, world)?;

        // A failed render aborts this frame only; the error was logged once
        // by the view and the next frame retries.
        let rendered = self
            .view
            .render(
                &frame,
                &packet,
                &self.materials,
                &self.viewport,
                self.backend.as_mut(),
            )
            .is_ok();
        if rendered {
            if let Err(error) = self.backend.present() {
                tracing::warn!(%error, "present failed, dropping frame");
            }
        }

        for event in self.ctx.events.drain() {
            match event {
                EngineEvent::Quit => return Ok(false),
                EngineEvent::Resized { width, height } => {
                    self.viewport = Viewport::perspective(
                        width,
                        height,
                        std::f32::consts::FRAC_PI_3,
                        0.1,
                        1000.0,
                    );
                }
                EngineEvent::FrameBudgetExceeded { requested } => {
                    tracing::warn!(requested, "frame allocator budget exceeded last frame");
                }
            }
        }
        Ok(true)
    }

    /// Tear down in reverse order of construction: scene resources first,
    /// then passes. Allocators unregister from the metric registry as the
    /// context drops.
    pub fn shutdown(&mut self) {
        if self.scene.state() == SceneState::Loaded {
            let _ = self.scene.unload();
            self.scene.update();
            self.scene.update();
        }
        self.view.destroy();
        tracing::info!("engine shut down");
    }

    pub fn metrics_report(&self) -> String {
        self.ctx.metrics.report()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_number
    }

    pub fn context(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }
}

/// Built-in demo scene used when no scene file is configured.
pub fn demo_scene_config() -> SceneConfig {
    let cube = |name: &str, material: u32, transparent: bool, position: [f32; 3]| MeshConfig {
        name: name.to_string(),
        resource: "mesh.cube".to_string(),
        material,
        transparent,
        transform: TransformConfig {
            position,
            ..TransformConfig::default()
        },
        ..MeshConfig::default()
    };

    SceneConfig {
        name: "demo".to_string(),
        skybox: Some(SkyboxConfig {
            name: "sky".to_string(),
            resource: "cubemap.sky".to_string(),
            material: 1,
        }),
        meshes: vec![
            cube("floor_block", 2, false, [0.0, -1.0, 0.0]),
            cube("crate_a", 3, false, [-1.5, 0.0, 0.0]),
            cube("crate_b", 3, false, [1.5, 0.0, 0.0]),
            cube("window_pane", 4, true, [0.0, 0.5, 2.0]),
        ],
        ..SceneConfig::default()
    }
}
