use std::path::Path;

use anyhow::Context;
use bevy::diagnostic::{FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin};
use bevy::prelude::*;
use bevy::window::PresentMode;
use bevy_egui::EguiPlugin;
use terrain_engine::{Brush, BrushShape, BrushTexture, TickScheduler};

mod config;
mod controller;
mod params;
mod preview;
mod rendering;
mod state;
mod ui;
mod ui_strings;

use config::ConfigSource;
use params::{ParamChanged, Parameters};
use rendering::frame::PaintSession;
use state::FrameTicker;
use ui_strings::UiStrings;

/// 日志插件启动前发生的问题，Startup 时再输出
#[derive(Resource, Default)]
struct StartupNotes {
    source: Option<ConfigSource>,
    warnings: Vec<String>,
}

fn load_brush(path: &Path) -> anyhow::Result<BrushShape> {
    let img = image::open(path).with_context(|| format!("opening brush {}", path.display()))?.to_luma8();
    let texture = BrushTexture::from_luma8(img.width(), img.height(), img.as_raw())?;
    Ok(BrushShape::Texture(texture))
}

fn log_startup(notes: Res<StartupNotes>) {
    match &notes.source {
        Some(ConfigSource::File(path)) => info!("config: {}", path.display()),
        Some(ConfigSource::Failed { path, error }) => warn!("config {} unusable, using defaults: {error}", path.display()),
        Some(ConfigSource::Defaults) | None => info!("config: defaults"),
    }
    for w in &notes.warnings {
        warn!("{w}");
    }
}

fn main() -> anyhow::Result<()> {
    let (config, source) = config::load_from_args(std::env::args());
    let mut notes = StartupNotes { source: Some(source), warnings: Vec::new() };

    let strings_path = config.ui_strings.clone().or_else(|| {
        let default = Path::new(ui_strings::DEFAULT_STRINGS_FILE);
        default.exists().then(|| default.to_path_buf())
    });
    let text = match &strings_path {
        Some(path) => ui_strings::load_from_file(path).unwrap_or_else(|e| {
            notes.warnings.push(format!("ui strings {}: {e:#}", path.display()));
            UiStrings::default()
        }),
        None => UiStrings::default(),
    };
    let shape = match &config.brush_texture {
        Some(path) => load_brush(path).unwrap_or_else(|e| {
            notes.warnings.push(format!("{e:#}; using the round brush"));
            BrushShape::Falloff
        }),
        None => BrushShape::Falloff,
    };

    let window = Window {
        title: config.window.title.clone(),
        resolution: (config.window.width, config.window.height).into(),
        present_mode: if config.window.vsync { PresentMode::AutoVsync } else { PresentMode::AutoNoVsync },
        ..default()
    };

    let exit = App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin { primary_window: Some(window), ..default() }))
        .add_plugins((EguiPlugin, FrameTimeDiagnosticsPlugin, LogDiagnosticsPlugin::default()))
        .add_event::<ParamChanged>()
        .insert_resource(Parameters::new(config.terrain.clone()))
        .insert_resource(FrameTicker(TickScheduler::new(config.terrain.render.cadence.sanitized())))
        .insert_resource(PaintSession::new(config.heightmap_size, Brush::from_params(&config.terrain.brush, shape)))
        .insert_resource(text)
        .insert_resource(notes)
        .insert_resource(config)
        .add_plugins((
            state::FrameStatePlugin,
            rendering::RenderingPlugin,
            controller::ControllerPlugin,
            ui::PanelPlugin,
        ))
        .add_systems(Startup, log_startup)
        .run();

    match exit {
        AppExit::Success => Ok(()),
        AppExit::Error(code) => Err(anyhow::anyhow!("editor exited with code {code}")),
    }
}
