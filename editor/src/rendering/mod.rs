//! Bevy side of the terrain graph: target images, cameras per pass, materials and meshes.

pub mod frame;
pub mod materials;
pub mod targets;
pub mod terrain_mesh;

use bevy::core_pipeline::tonemapping::{DebandDither, Tonemapping};
use bevy::prelude::*;
use bevy::render::camera::RenderTarget;
use bevy::render::view::{NoFrustumCulling, RenderLayers};
use bevy::sprite::Material2dPlugin;
use bevy::window::PrimaryWindow;
use terrain_engine::pipeline::{terrain_graph, HEIGHT, HEIGHTMAP_PASS, PAINT, TERRAIN_PASS, UV_ID, UV_ID_PASS};
use terrain_engine::{Brush, ParamChange, ParamGroup, ParamKey, RenderMode, TerrainParams};

use crate::config::EditorConfig;
use crate::controller::{OrbitCamera, UvCamera};
use crate::params::{touched, ParamChanged, Parameters};
use crate::state::FrameState;
use frame::{on_uv_readback, resize_targets, run_tick, LastFrame, PassCamera, PaintSession, TerrainGraph, UvReadback};
use materials::{NoiseMaterial, NoiseUniform, TerrainMaterial, TerrainUniform};
use targets::{BevyTargets, ImageTargets};

/// 高度图四边形所在的渲染层
pub const HEIGHTMAP_LAYER: usize = 1;
pub const UV_LAYER: usize = 2;

/// Handles shared by the parameter systems.
#[derive(Resource)]
pub struct TerrainAssets {
    pub gpu_mesh: Handle<Mesh>,
    pub cpu_mesh: Handle<Mesh>,
    pub terrain: Handle<TerrainMaterial>,
    pub uv_terrain: Handle<TerrainMaterial>,
    pub noise: Handle<NoiseMaterial>,
    pub cpu_material: Handle<StandardMaterial>,
    pub map_size: u32,
}

#[derive(Component)]
pub struct GpuTerrain;

#[derive(Component)]
pub struct CpuTerrain;

pub struct RenderingPlugin;

impl Plugin for RenderingPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            MaterialPlugin::<TerrainMaterial> { prepass_enabled: false, shadows_enabled: false, ..default() },
            Material2dPlugin::<NoiseMaterial>::default(),
        ))
        .init_resource::<BevyTargets>()
        .init_resource::<LastFrame>()
        .add_systems(Startup, (allocate_targets, spawn_scene).chain())
        .add_systems(
            Update,
            (
                resize_targets,
                (refresh_materials, rebuild_meshes, apply_render_mode, update_brush),
                run_tick.run_if(in_state(FrameState::Running)),
            )
                .chain()
                .run_if(resource_exists::<TerrainAssets>),
        );
    }
}

fn allocate_targets(
    mut commands: Commands,
    windows: Query<&Window, With<PrimaryWindow>>,
    config: Res<EditorConfig>,
    mut targets: ResMut<BevyTargets>,
    mut images: ResMut<Assets<Image>>,
    mut exit: EventWriter<AppExit>,
) {
    let viewport = windows
        .get_single()
        .map(|w| (w.physical_width(), w.physical_height()))
        .unwrap_or((config.window.width as u32, config.window.height as u32));
    let mut provider = ImageTargets { images: &mut images, targets: &mut targets };
    let graph = terrain_graph(config.heightmap_size, viewport).and_then(|mut graph| {
        graph.allocate(&mut provider)?;
        Ok(graph)
    });
    match graph {
        Ok(graph) => {
            info!("render graph {:?}, viewport {}x{}", graph.order().unwrap_or_default(), viewport.0, viewport.1);
            commands.insert_resource(TerrainGraph(graph));
        }
        Err(e) => {
            error!("cannot build the render graph: {e}");
            exit.send(AppExit::error());
        }
    }
}

/// Camera order follows the compiled pass order; the screen pass lands on 0.
fn camera_order(graph: &TerrainGraph, pass: &str) -> isize {
    let order = graph.order().unwrap_or_default();
    let index = order.iter().position(|p| *p == pass).unwrap_or(0);
    index as isize - (order.len() as isize - 1)
}

#[allow(clippy::too_many_arguments)]
fn spawn_scene(
    mut commands: Commands,
    graph: Option<Res<TerrainGraph>>,
    targets: Res<BevyTargets>,
    params: Res<Parameters>,
    config: Res<EditorConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut terrain_materials: ResMut<Assets<TerrainMaterial>>,
    mut noise_materials: ResMut<Assets<NoiseMaterial>>,
    mut standard_materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(graph) = graph else {
        return;
    };
    let (Some(height), Some(uv), Some(paint)) = (targets.handle(HEIGHT), targets.handle(UV_ID), targets.handle(PAINT))
    else {
        error!("render targets missing; scene not spawned");
        return;
    };
    let terrain = params.params();
    let map_size = config.heightmap_size;

    // heightmap pass: 全屏四边形写入高度目标
    let noise = noise_materials.add(NoiseMaterial { settings: NoiseUniform::new(&terrain.noise, &terrain.grid) });
    commands.spawn((
        Camera2d,
        Camera {
            order: camera_order(&graph, HEIGHTMAP_PASS),
            target: RenderTarget::Image(height.clone()),
            hdr: true,
            is_active: false,
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        Msaa::Off,
        Tonemapping::None,
        DebandDither::Disabled,
        RenderLayers::layer(HEIGHTMAP_LAYER),
        PassCamera(HEIGHTMAP_PASS),
    ));
    commands.spawn((
        Mesh2d(meshes.add(Rectangle::new(map_size as f32, map_size as f32))),
        MeshMaterial2d(noise.clone()),
        RenderLayers::layer(HEIGHTMAP_LAYER),
    ));

    let gpu_mesh = match terrain_mesh::gpu_grid_mesh(terrain) {
        Ok(mesh) => meshes.add(mesh),
        Err(e) => {
            warn!("terrain grid: {e}");
            meshes.add(Mesh::from(Plane3d::default()))
        }
    };
    let settings = TerrainUniform::new(terrain, map_size);
    let terrain_material = terrain_materials.add(TerrainMaterial {
        settings,
        height: height.clone(),
        paint: paint.clone(),
        uv_id: false,
    });
    let uv_material = terrain_materials.add(TerrainMaterial { settings, height, paint, uv_id: true });

    let orbit = OrbitCamera { distance: terrain.grid.size * 1.4, ..default() };
    commands.spawn((
        Camera3d::default(),
        Camera {
            order: camera_order(&graph, UV_ID_PASS),
            target: RenderTarget::Image(uv),
            hdr: true,
            is_active: false,
            clear_color: ClearColorConfig::Custom(Color::NONE),
            ..default()
        },
        Msaa::Off,
        Tonemapping::None,
        DebandDither::Disabled,
        RenderLayers::layer(UV_LAYER),
        orbit.transform(),
        UvCamera,
        PassCamera(UV_ID_PASS),
    ));
    commands.spawn((
        Camera3d::default(),
        Camera { order: camera_order(&graph, TERRAIN_PASS), ..default() },
        orbit.transform(),
        orbit,
        PassCamera(TERRAIN_PASS),
    ));
    commands.spawn((
        DirectionalLight { illuminance: 8_000.0, ..default() },
        Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.insert_resource(AmbientLight { color: Color::WHITE, brightness: 300.0 });

    let gpu_shaded = terrain.render.mode == RenderMode::GpuShaded;
    commands.spawn((
        Mesh3d(gpu_mesh.clone()),
        MeshMaterial3d(terrain_material.clone()),
        Transform::default(),
        NoFrustumCulling,
        GpuTerrain,
        visible(gpu_shaded),
    ));
    commands.spawn((
        Mesh3d(gpu_mesh.clone()),
        MeshMaterial3d(uv_material.clone()),
        Transform::default(),
        NoFrustumCulling,
        RenderLayers::layer(UV_LAYER),
    ));

    let cpu_mesh = meshes.add(cpu_mesh_or_empty(terrain));
    let cpu_material = standard_materials.add(StandardMaterial {
        base_color: Color::srgb_from_array(terrain.render.color),
        perceptual_roughness: 0.9,
        ..default()
    });
    commands.spawn((
        Mesh3d(cpu_mesh.clone()),
        MeshMaterial3d(cpu_material.clone()),
        Transform::default(),
        CpuTerrain,
        visible(!gpu_shaded),
    ));

    let readback = commands.spawn(Name::new("uv_readback")).observe(on_uv_readback).id();
    commands.insert_resource(UvReadback::new(readback));
    commands.insert_resource(TerrainAssets {
        gpu_mesh,
        cpu_mesh,
        terrain: terrain_material,
        uv_terrain: uv_material,
        noise,
        cpu_material,
        map_size,
    });
}

fn visible(on: bool) -> Visibility {
    if on {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    }
}

fn cpu_mesh_or_empty(params: &TerrainParams) -> Mesh {
    match terrain_mesh::cpu_grid_mesh(params) {
        Ok(mesh) => mesh,
        Err(e) => {
            warn!("cpu terrain mesh: {e}");
            Mesh::from(Plane3d::default())
        }
    }
}

/// Push parameter changes into the material uniforms.
fn refresh_materials(
    mut events: EventReader<ParamChanged>,
    params: Res<Parameters>,
    assets: Res<TerrainAssets>,
    mut noise_materials: ResMut<Assets<NoiseMaterial>>,
    mut terrain_materials: ResMut<Assets<TerrainMaterial>>,
    mut standard_materials: ResMut<Assets<StandardMaterial>>,
) {
    let mut noise_or_grid = false;
    let mut any = false;
    for ev in events.read() {
        any = true;
        noise_or_grid |= matches!(ev.group(), ParamGroup::Noise | ParamGroup::Grid);
    }
    if !any {
        return;
    }
    let terrain = params.params();
    if noise_or_grid {
        if let Some(material) = noise_materials.get_mut(&assets.noise) {
            material.settings = NoiseUniform::new(&terrain.noise, &terrain.grid);
        }
    }
    let settings = TerrainUniform::new(terrain, assets.map_size);
    for handle in [&assets.terrain, &assets.uv_terrain] {
        if let Some(material) = terrain_materials.get_mut(handle) {
            material.settings = settings;
        }
    }
    if let Some(material) = standard_materials.get_mut(&assets.cpu_material) {
        let [r, g, b] = terrain.render.color;
        material.base_color = Color::srgb(r, g, b);
    }
}

fn rebuild_meshes(
    mut events: EventReader<ParamChanged>,
    params: Res<Parameters>,
    assets: Res<TerrainAssets>,
    mut meshes: ResMut<Assets<Mesh>>,
) {
    let changes: Vec<ParamChange> = events.read().map(|ev| ev.0).collect();
    if changes.is_empty() {
        return;
    }
    let terrain = params.params();
    if changes.iter().any(|c| c.key.group() == ParamGroup::Grid) {
        match terrain_mesh::gpu_grid_mesh(terrain) {
            Ok(mesh) => meshes.insert(&assets.gpu_mesh, mesh),
            Err(e) => warn!("terrain grid: {e}"),
        }
    }
    if cpu_mesh_stale(&changes, terrain.render.mode) {
        meshes.insert(&assets.cpu_mesh, cpu_mesh_or_empty(terrain));
    }
}

/// CPU 网格只在 CPU 模式下重建：高度或网格变了，或刚切回 CPU 模式
fn cpu_mesh_stale(changes: &[ParamChange], mode: RenderMode) -> bool {
    mode == RenderMode::CpuMesh
        && changes
            .iter()
            .any(|c| matches!(c.key.group(), ParamGroup::Noise | ParamGroup::Grid) || c.key == ParamKey::GpuShaded)
}

fn apply_render_mode(
    mut events: EventReader<ParamChanged>,
    params: Res<Parameters>,
    mut gpu: Query<&mut Visibility, (With<GpuTerrain>, Without<CpuTerrain>)>,
    mut cpu: Query<&mut Visibility, (With<CpuTerrain>, Without<GpuTerrain>)>,
) {
    if !touched(&mut events, &[ParamGroup::Render]) {
        return;
    }
    let gpu_shaded = params.params().render.mode == RenderMode::GpuShaded;
    for mut v in &mut gpu {
        *v = visible(gpu_shaded);
    }
    for mut v in &mut cpu {
        *v = visible(!gpu_shaded);
    }
}

fn update_brush(mut events: EventReader<ParamChanged>, params: Res<Parameters>, mut paint: ResMut<PaintSession>) {
    if touched(&mut events, &[ParamGroup::Brush]) {
        let shape = paint.brush.shape.clone();
        paint.brush = Brush::from_params(&params.params().brush, shape);
    }
}
