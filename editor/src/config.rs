use std::path::{Path, PathBuf};

use anyhow::Context;
use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use terrain_engine::pipeline::DEFAULT_HEIGHTMAP_SIZE;
use terrain_engine::TerrainParams;

pub const DEFAULT_CONFIG_FILE: &str = "terrain_editor.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Terrain Editor".to_string(), width: 1280.0, height: 720.0, vsync: true }
    }
}

/// 编辑器启动配置（RON）
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub window: WindowConfig,
    /// Processing resolution of the heightmap and paint targets.
    pub heightmap_size: u32,
    /// Optional grayscale brush mask.
    pub brush_texture: Option<PathBuf>,
    /// Optional `UiStrings` override (JSON).
    pub ui_strings: Option<PathBuf>,
    pub terrain: TerrainParams,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            heightmap_size: DEFAULT_HEIGHTMAP_SIZE,
            brush_texture: None,
            ui_strings: None,
            terrain: TerrainParams::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_ron_str(s: &str) -> anyhow::Result<Self> {
        let mut config: EditorConfig = ron::from_str(s)?;
        config.heightmap_size = config.heightmap_size.clamp(16, 4096);
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_ron_str(&s).with_context(|| format!("parsing {}", path.display()))
    }
}

/// Where the configuration came from, for the startup log.
#[derive(Resource, Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// The file existed but could not be used; defaults were applied.
    Failed { path: PathBuf, error: String },
}

/// First CLI argument, else `terrain_editor.ron` if present, else defaults.
pub fn load_from_args(args: impl IntoIterator<Item = String>) -> (EditorConfig, ConfigSource) {
    let path = match args.into_iter().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return (EditorConfig::default(), ConfigSource::Defaults);
            }
            default
        }
    };
    match EditorConfig::load_from_file(&path) {
        Ok(config) => (config, ConfigSource::File(path)),
        Err(e) => (EditorConfig::default(), ConfigSource::Failed { path, error: format!("{e:#}") }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrain_engine::{FrameCadence, RenderMode};

    #[test]
    fn partial_config_keeps_defaults() {
        let config = EditorConfig::from_ron_str(
            "(window: (title: \"Hills\"), terrain: (noise: (octaves: 7), render: (mode: CpuMesh, cadence: FixedInterval(hz: 20.0))))",
        )
        .unwrap();
        assert_eq!(config.window.title, "Hills");
        assert_eq!(config.window.width, 1280.0);
        assert_eq!(config.heightmap_size, DEFAULT_HEIGHTMAP_SIZE);
        assert_eq!(config.terrain.noise.octaves, 7);
        assert_eq!(config.terrain.render.mode, RenderMode::CpuMesh);
        assert_eq!(config.terrain.render.cadence, FrameCadence::FixedInterval { hz: 20.0 });
    }

    #[test]
    fn heightmap_size_is_clamped() {
        let config = EditorConfig::from_ron_str("(heightmap_size: 1)").unwrap();
        assert_eq!(config.heightmap_size, 16);
    }

    #[test]
    fn bad_config_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("terrain_editor_bad_{}.ron", std::process::id()));
        std::fs::write(&path, "(window: 12)").unwrap();
        let (config, source) = load_from_args(["terrain_editor".to_string(), path.display().to_string()]);
        std::fs::remove_file(&path).ok();
        assert_eq!(config, EditorConfig::default());
        assert!(matches!(source, ConfigSource::Failed { .. }));
    }

    #[test]
    fn config_file_argument_is_loaded() {
        let path = std::env::temp_dir().join(format!("terrain_editor_ok_{}.ron", std::process::id()));
        std::fs::write(&path, "(heightmap_size: 256, terrain: (grid: (resolution: 64)))").unwrap();
        let (config, source) = load_from_args(["terrain_editor".to_string(), path.display().to_string()]);
        std::fs::remove_file(&path).ok();
        assert_eq!(config.heightmap_size, 256);
        assert_eq!(config.terrain.grid.resolution, 64);
        assert_eq!(source, ConfigSource::File(path));
    }
}
