use bevy::prelude::*;
use bevy_egui::egui;
use terrain_engine::{HeightSample, NoiseEvaluator, TerrainParams};

use crate::ui_strings::UiStrings;

/// CPU-side heightmap preview, sampled over the grid's world extent.
#[derive(Resource)]
pub struct PreviewState {
    pub width: u32,
    pub height: u32,
    pub show_window: bool,
    texture: Option<egui::TextureHandle>,
    range: Option<(f32, f32)>,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self { width: 256, height: 256, show_window: false, texture: None, range: None }
    }
}

/// 在整个网格范围内采样；行 0 对应 v = 0，即 z = +size/2，与高度目标的行序一致
pub fn sample_preview(params: &TerrainParams, width: u32, height: u32) -> Result<HeightSample, terrain_engine::TerrainError> {
    let size = params.grid.size;
    let noise = NoiseEvaluator::new(&params.noise)?;
    Ok(noise.sample_region([-0.5 * size, 0.5 * size], [size, -size], width.max(16), height.max(16)))
}

fn generate(ctx: &egui::Context, state: &mut PreviewState, params: &TerrainParams) {
    match sample_preview(params, state.width, state.height) {
        Ok(sample) => {
            let img = egui::ColorImage::from_gray([sample.width as usize, sample.height as usize], &sample.to_gray());
            state.texture = Some(ctx.load_texture("noise_preview", img, egui::TextureOptions::NEAREST));
            state.range = Some((sample.min, sample.max));
        }
        Err(e) => warn!("preview: {e}"),
    }
}

fn show_texture(ui: &mut egui::Ui, state: &PreviewState, text: &UiStrings) {
    let Some(tex) = &state.texture else {
        return;
    };
    if let Some((min, max)) = state.range {
        ui.label(format!("{}: {:.3} .. {:.3}", text.preview.range, min, max));
    }
    let tex_size = tex.size_vec2();
    let available = ui.available_size_before_wrap();
    let scale = (available.x / tex_size.x).min(1.0);
    ui.image(egui::load::SizedTexture::new(tex.id(), tex_size * scale));
}

pub fn preview_ui(ui: &mut egui::Ui, state: &mut PreviewState, params: &TerrainParams, text: &UiStrings) {
    ui.heading(&text.preview.title);

    ui.horizontal(|ui| {
        ui.label(&text.preview.resolution);
        ui.add(egui::Slider::new(&mut state.width, 32..=1024).text(&text.preview.width_short));
        ui.add(egui::Slider::new(&mut state.height, 32..=1024).text(&text.preview.height_short));
    });

    ui.horizontal(|ui| {
        if ui.button(&text.preview.generate).clicked() {
            generate(ui.ctx(), state, params);
        }
        if ui.button(&text.preview.open_window).clicked() {
            state.show_window = true;
        }
    });

    if state.show_window {
        let mut open = true;
        egui::Window::new(&text.preview.window_title)
            .open(&mut open)
            .resizable(true)
            .vscroll(true)
            .show(ui.ctx(), |ui| {
                if ui.button(&text.preview.generate).clicked() {
                    generate(ui.ctx(), state, params);
                }
                show_texture(ui, state, text);
            });
        if !open {
            state.show_window = false;
        }
    } else {
        show_texture(ui, state, text);
    }
}
