//! Runtime configuration
//!
//! Loaded from JSON next to the binary; missing files fall back to defaults,
//! malformed files are a startup error.

use anyhow::Context;
use keel_core::context::MemoryConfig;
use keel_scene::SceneConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub memory: MemoryConfig,
    pub window_width: u32,
    pub window_height: u32,
    /// Frames to run before exiting; 0 runs until a quit event.
    pub max_frames: u64,
    /// Optional scene description; the built-in demo scene is used when
    /// absent.
    pub scene_path: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            window_width: 1280,
            window_height: 720,
            max_frames: 240,
            scene_path: None,
        }
    }
}

impl RuntimeConfig {
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "no runtime config found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading runtime config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing runtime config {}", path.display()))
    }
}

pub fn load_scene(path: &Path) -> anyhow::Result<SceneConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading scene config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing scene config {}", path.display()))
}
