use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};
use terrain_engine::{PaintState, ParamKey, ParamValue};

use crate::params::{ParamChanged, Parameters};
use crate::preview::{preview_ui, PreviewState};
use crate::rendering::frame::{LastFrame, PaintSession};
use crate::state::{flipped, FrameState};
use crate::ui_strings::UiStrings;

pub struct PanelPlugin;

impl Plugin for PanelPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PreviewState>().add_systems(Update, panel_ui);
    }
}

/// Numeric binding. Wide-ranged keys get a drag field, the rest a slider.
pub fn bind_number(ui: &mut egui::Ui, text: &UiStrings, key: ParamKey, params: &mut Parameters, events: &mut EventWriter<ParamChanged>) {
    let (ParamValue::Number(mut value), Some((min, max))) = (params.get(key), key.range()) else {
        return;
    };
    let label = text.params.label(key);
    let changed = match key {
        ParamKey::Seed | ParamKey::OffsetX | ParamKey::OffsetY => {
            ui.horizontal(|ui| {
                ui.label(label);
                ui.add(egui::DragValue::new(&mut value).range(min..=max).speed(if key == ParamKey::Seed { 1.0 } else { 0.1 }))
            })
            .inner
            .changed()
        }
        _ => {
            let mut slider = egui::Slider::new(&mut value, min..=max).text(label);
            if matches!(key, ParamKey::Octaves | ParamKey::Resolution) {
                slider = slider.integer();
            }
            if matches!(key, ParamKey::Scale | ParamKey::Amplitude) {
                slider = slider.logarithmic(true);
            }
            ui.add(slider).changed()
        }
    };
    if changed {
        params.apply(key, ParamValue::Number(value), events);
    }
}

pub fn bind_boolean(ui: &mut egui::Ui, text: &UiStrings, key: ParamKey, params: &mut Parameters, events: &mut EventWriter<ParamChanged>) {
    let ParamValue::Bool(mut value) = params.get(key) else {
        return;
    };
    if ui.checkbox(&mut value, text.params.label(key)).changed() {
        params.apply(key, ParamValue::Bool(value), events);
    }
}

pub fn bind_color(ui: &mut egui::Ui, text: &UiStrings, key: ParamKey, params: &mut Parameters, events: &mut EventWriter<ParamChanged>) {
    let ParamValue::Color(mut value) = params.get(key) else {
        return;
    };
    let changed = ui
        .horizontal(|ui| {
            ui.label(text.params.label(key));
            ui.color_edit_button_rgb(&mut value)
        })
        .inner
        .changed();
    if changed {
        params.apply(key, ParamValue::Color(value), events);
    }
}

fn bind(ui: &mut egui::Ui, text: &UiStrings, key: ParamKey, params: &mut Parameters, events: &mut EventWriter<ParamChanged>) {
    match params.get(key) {
        ParamValue::Number(_) => bind_number(ui, text, key, params, events),
        ParamValue::Bool(_) => bind_boolean(ui, text, key, params, events),
        ParamValue::Color(_) => bind_color(ui, text, key, params, events),
    }
}

const NOISE_KEYS: [ParamKey; 9] = [
    ParamKey::Amplitude,
    ParamKey::Persistence,
    ParamKey::Octaves,
    ParamKey::Lacunarity,
    ParamKey::Scale,
    ParamKey::Seed,
    ParamKey::OffsetX,
    ParamKey::OffsetY,
    ParamKey::CoupledFrequency,
];
const GRID_KEYS: [ParamKey; 2] = [ParamKey::Size, ParamKey::Resolution];
const BRUSH_KEYS: [ParamKey; 4] =
    [ParamKey::BrushRadius, ParamKey::BrushStrength, ParamKey::BrushErase, ParamKey::PaintHeight];
const RENDER_KEYS: [ParamKey; 3] = [ParamKey::GpuShaded, ParamKey::Color, ParamKey::FixedCadence];

#[allow(clippy::too_many_arguments)]
fn panel_ui(
    mut contexts: EguiContexts,
    mut params: ResMut<Parameters>,
    mut events: EventWriter<ParamChanged>,
    text: Res<UiStrings>,
    diagnostics: Res<DiagnosticsStore>,
    last: Res<LastFrame>,
    mut paint: ResMut<PaintSession>,
    state: Res<State<FrameState>>,
    mut next: ResMut<NextState<FrameState>>,
    mut preview: ResMut<PreviewState>,
) {
    let Some(ctx) = contexts.try_ctx_mut() else {
        return;
    };
    egui::SidePanel::left("terrain_panel").default_width(300.0).show(ctx, |ui| {
        ui.heading(&text.panel.title);
        egui::ScrollArea::vertical().show(ui, |ui| {
            let groups: [(&str, &[ParamKey]); 4] = [
                (text.panel.noise.as_str(), &NOISE_KEYS[..]),
                (text.panel.grid.as_str(), &GRID_KEYS[..]),
                (text.panel.brush.as_str(), &BRUSH_KEYS[..]),
                (text.panel.render.as_str(), &RENDER_KEYS[..]),
            ];
            for (heading, keys) in groups {
                egui::CollapsingHeader::new(heading).default_open(true).show(ui, |ui| {
                    for &key in keys {
                        bind(ui, &text, key, &mut params, &mut events);
                    }
                });
            }

            ui.horizontal(|ui| {
                if ui.button(&text.panel.random_seed).clicked() {
                    let seed = rand::random::<u32>();
                    params.apply(ParamKey::Seed, ParamValue::Number(seed as f64), &mut events);
                }
                if ui.button(&text.panel.clear_paint).clicked() {
                    paint.layer.clear();
                    paint.needs_upload = true;
                }
                let running = *state.get() == FrameState::Running;
                if ui.button(if running { &text.panel.pause } else { &text.panel.resume }).clicked() {
                    next.set(flipped(*state.get()));
                }
            });

            ui.separator();
            if let Some(fps) = diagnostics.get(&FrameTimeDiagnosticsPlugin::FPS).and_then(|d| d.smoothed()) {
                ui.label(format!("{}: {:.1}", text.panel.fps, fps));
            }
            ui.label(format!("{}: {}  {:?}", text.panel.frame, last.frame_index, last.rendered));
            let paint_state = match paint.controller.state() {
                PaintState::Idle => "idle",
                PaintState::Painting => "painting",
            };
            ui.label(format!("{}: {}", text.panel.paint_state, paint_state));
            ui.small(&text.panel.hint);

            ui.separator();
            preview_ui(ui, &mut preview, params.params(), &text);
        });
    });
}
