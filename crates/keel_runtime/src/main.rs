//! Keel Engine Runtime
//!
//! Minimal binary that wires the engine crates together and drives the
//! frame loop against the headless backend.

use anyhow::Result;
use keel_render::HeadlessBackend;
use std::path::Path;

mod config;
mod engine;

use config::RuntimeConfig;
use engine::Engine;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Keel Engine v{}", keel_core::VERSION);
    let config = RuntimeConfig::load_or_default(Path::new("keel.json"))?;

    let scene_config = match &config.scene_path {
        Some(path) => config::load_scene(Path::new(path))?,
        None => engine::demo_scene_config(),
    };

    let mut engine = Engine::new(&config, Box::new(HeadlessBackend::new()), scene_config)?;
    engine.run(config.max_frames)?;

    tracing::info!("{}", engine.metrics_report());
    engine.shutdown();
    Ok(())
}
