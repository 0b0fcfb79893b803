use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};
use terrain_engine::ParamKey;

#[derive(Resource, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct UiStrings {
    pub panel: PanelStrings,
    pub params: ParamLabels,
    pub preview: PreviewStrings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PanelStrings {
    pub title: String,
    pub noise: String,
    pub grid: String,
    pub brush: String,
    pub render: String,
    pub random_seed: String,
    pub clear_paint: String,
    pub pause: String,
    pub resume: String,
    pub fps: String,
    pub frame: String,
    pub paint_state: String,
    pub hint: String,
}

/// One label per parameter key.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ParamLabels {
    pub amplitude: String,
    pub persistence: String,
    pub octaves: String,
    pub lacunarity: String,
    pub scale: String,
    pub seed: String,
    pub offset_x: String,
    pub offset_y: String,
    pub coupled_frequency: String,
    pub size: String,
    pub resolution: String,
    pub brush_radius: String,
    pub brush_strength: String,
    pub brush_erase: String,
    pub paint_height: String,
    pub gpu_shaded: String,
    pub color: String,
    pub fixed_cadence: String,
}

impl ParamLabels {
    pub fn label(&self, key: ParamKey) -> &str {
        match key {
            ParamKey::Amplitude => &self.amplitude,
            ParamKey::Persistence => &self.persistence,
            ParamKey::Octaves => &self.octaves,
            ParamKey::Lacunarity => &self.lacunarity,
            ParamKey::Scale => &self.scale,
            ParamKey::Seed => &self.seed,
            ParamKey::OffsetX => &self.offset_x,
            ParamKey::OffsetY => &self.offset_y,
            ParamKey::CoupledFrequency => &self.coupled_frequency,
            ParamKey::Size => &self.size,
            ParamKey::Resolution => &self.resolution,
            ParamKey::BrushRadius => &self.brush_radius,
            ParamKey::BrushStrength => &self.brush_strength,
            ParamKey::BrushErase => &self.brush_erase,
            ParamKey::PaintHeight => &self.paint_height,
            ParamKey::GpuShaded => &self.gpu_shaded,
            ParamKey::Color => &self.color,
            ParamKey::FixedCadence => &self.fixed_cadence,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct PreviewStrings {
    pub title: String,
    pub resolution: String,
    pub generate: String,
    pub width_short: String,
    pub height_short: String,
    pub open_window: String,
    pub window_title: String,
    pub range: String,
}

impl Default for PanelStrings {
    fn default() -> Self {
        Self {
            title: "Terrain".to_string(),
            noise: "Noise".to_string(),
            grid: "Grid".to_string(),
            brush: "Brush".to_string(),
            render: "Render".to_string(),
            random_seed: "Random Seed".to_string(),
            clear_paint: "Clear Paint".to_string(),
            pause: "Pause".to_string(),
            resume: "Resume".to_string(),
            fps: "FPS".to_string(),
            frame: "Frame".to_string(),
            paint_state: "Paint".to_string(),
            hint: "Left drag: paint  Right drag: orbit  Wheel: zoom  Space: pause".to_string(),
        }
    }
}

impl Default for ParamLabels {
    fn default() -> Self {
        Self {
            amplitude: "Amplitude".to_string(),
            persistence: "Persistence".to_string(),
            octaves: "Octaves".to_string(),
            lacunarity: "Lacunarity".to_string(),
            scale: "Scale".to_string(),
            seed: "Seed".to_string(),
            offset_x: "Offset X".to_string(),
            offset_y: "Offset Y".to_string(),
            coupled_frequency: "Coupled frequency (legacy)".to_string(),
            size: "Size".to_string(),
            resolution: "Resolution".to_string(),
            brush_radius: "Radius".to_string(),
            brush_strength: "Strength".to_string(),
            brush_erase: "Erase".to_string(),
            paint_height: "Paint height".to_string(),
            gpu_shaded: "GPU shaded".to_string(),
            color: "Color".to_string(),
            fixed_cadence: "Fixed 30 Hz ticks".to_string(),
        }
    }
}

impl Default for PreviewStrings {
    fn default() -> Self {
        Self {
            title: "Preview".to_string(),
            resolution: "Resolution".to_string(),
            generate: "Generate".to_string(),
            width_short: "W".to_string(),
            height_short: "H".to_string(),
            open_window: "Open Preview Window".to_string(),
            window_title: "Noise Preview".to_string(),
            range: "Range".to_string(),
        }
    }
}

pub const DEFAULT_STRINGS_FILE: &str = "ui_strings.json";

pub fn load_from_file(path: &Path) -> anyhow::Result<UiStrings> {
    let s = std::fs::read_to_string(path)?;
    let ui: UiStrings = serde_json::from_str(&s)?;
    Ok(ui)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_has_a_default_label() {
        let ui = UiStrings::default();
        for key in ParamKey::ALL {
            assert!(!ui.params.label(key).is_empty(), "{}", key.name());
        }
    }

    #[test]
    fn json_override_is_partial() {
        let ui: UiStrings = serde_json::from_str(r#"{ "panel": { "title": "地形" }, "params": { "seed": "种子" } }"#).unwrap();
        assert_eq!(ui.panel.title, "地形");
        assert_eq!(ui.params.label(ParamKey::Seed), "种子");
        assert_eq!(ui.preview.generate, "Generate");
        assert_eq!(ui.params.amplitude, "Amplitude");
    }
}
