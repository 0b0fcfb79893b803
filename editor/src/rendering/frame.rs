//! Drives the render graph from the Bevy schedule.
//!
//! Each tick the graph is run against [`PassPlanner`], which decides per pass whether it has
//! work this tick. GPU passes map to cameras rendering into their target image and are
//! switched on or off; the brush pass runs on the host and uploads the paint layer.

use bevy::prelude::*;
use bevy::render::gpu_readback::{Readback, ReadbackComplete};
use bevy::window::{PrimaryWindow, WindowResized};
use terrain_engine::pipeline::{BRUSH_PASS, HEIGHTMAP_PASS, PAINT, TERRAIN_PASS, UV_ID, UV_ID_PASS};
use terrain_engine::{
    Brush, BrushStamp, FrameContext, FrameReport, HeightLayer, HostTargets, PaintController, PaintState, PassDesc,
    PassExecutor, PassOutcome, RenderGraph, RenderMode, TargetProvider, TerrainError,
};

use crate::params::Parameters;
use crate::rendering::materials::TerrainMaterial;
use crate::rendering::targets::{BevyTargets, ImageTargets};
use crate::rendering::TerrainAssets;
use crate::state::FrameTicker;

#[derive(Resource, Deref, DerefMut)]
pub struct TerrainGraph(pub RenderGraph);

/// Camera that renders one graph pass.
#[derive(Component, Debug, Clone, Copy)]
pub struct PassCamera(pub &'static str);

#[derive(Resource)]
pub struct PaintSession {
    pub controller: PaintController,
    pub layer: HeightLayer,
    pub brush: Brush,
    pub last_stamp: Option<BrushStamp>,
    /// The layer changed outside the brush pass (cleared) and must be uploaded.
    pub needs_upload: bool,
}

impl PaintSession {
    pub fn new(map_size: u32, brush: Brush) -> Self {
        Self {
            controller: PaintController::new(UV_ID, (map_size, map_size)),
            layer: HeightLayer::new(map_size, map_size),
            brush,
            last_stamp: None,
            needs_upload: false,
        }
    }
}

/// Entity carrying the UV-id `Readback` on painting ticks, and the size it was requested at.
#[derive(Resource)]
pub struct UvReadback {
    pub entity: Entity,
    /// Kept after the component is detached; results arrive a frame or more later.
    pub requested: Option<(u32, u32)>,
    pub attached: bool,
}

impl UvReadback {
    pub fn new(entity: Entity) -> Self {
        Self { entity, requested: None, attached: false }
    }

    /// Whether the `Readback` component should be inserted (`Some(true)`) or removed (`Some(false)`)
    /// this display frame. Only ticks that paint read back.
    pub fn transition(&mut self, wanted: bool) -> Option<bool> {
        if wanted == self.attached {
            return None;
        }
        self.attached = wanted;
        Some(wanted)
    }
}

/// Camera state for one display frame. `plan` is the tick's activations, `None` between ticks,
/// where every offscreen pass is switched off so nothing renders without a tick.
pub fn camera_active(pass: &str, plan: Option<&[(&'static str, bool)]>) -> Option<bool> {
    match plan {
        Some(plan) => plan.iter().find(|(name, _)| *name == pass).map(|&(_, active)| active),
        None => (pass != TERRAIN_PASS).then_some(false),
    }
}

#[derive(Resource, Default, Deref)]
pub struct LastFrame(pub FrameReport);

pub struct PassPlanner<'a> {
    pub mode: RenderMode,
    pub paint: &'a mut PaintSession,
    pub host: &'a HostTargets,
    pub cameras: Vec<(&'static str, bool)>,
    pub paint_changed: bool,
}

impl PassExecutor for PassPlanner<'_> {
    fn execute(&mut self, pass: &PassDesc, _frame: &FrameContext) -> Result<PassOutcome, TerrainError> {
        let gpu = self.mode == RenderMode::GpuShaded;
        let outcome = match pass.name {
            // 每个 GPU tick 都重画，着色器晚加载也不会留下平地
            HEIGHTMAP_PASS => gpu,
            // UV-id 只在按下鼠标时才需要
            UV_ID_PASS => gpu && self.paint.controller.state() == PaintState::Painting,
            TERRAIN_PASS => true,
            BRUSH_PASS => {
                if !gpu {
                    return Ok(PassOutcome::Skipped);
                }
                let paint = &mut *self.paint;
                let stamp = paint.controller.tick(self.host, &paint.brush)?;
                paint.last_stamp = stamp;
                if let Some(stamp) = stamp {
                    self.paint_changed |= paint.layer.apply_stamp(&stamp, &paint.brush.shape);
                }
                return Ok(if self.paint_changed { PassOutcome::Rendered } else { PassOutcome::Skipped });
            }
            _ => return Err(TerrainError::UnknownPass(pass.name.to_string())),
        };
        self.cameras.push((pass.name, outcome));
        Ok(if outcome { PassOutcome::Rendered } else { PassOutcome::Skipped })
    }
}

#[allow(clippy::too_many_arguments)]
pub fn run_tick(
    mut commands: Commands,
    time: Res<Time>,
    mut ticker: ResMut<FrameTicker>,
    mut graph: ResMut<TerrainGraph>,
    mut targets: ResMut<BevyTargets>,
    mut paint: ResMut<PaintSession>,
    mut readback: ResMut<UvReadback>,
    mut last: ResMut<LastFrame>,
    mut images: ResMut<Assets<Image>>,
    mut cameras: Query<(&PassCamera, &mut Camera)>,
    params: Res<Parameters>,
    assets: Res<TerrainAssets>,
    mut materials: ResMut<Assets<TerrainMaterial>>,
) {
    if !ticker.advance(time.delta()) {
        between_ticks(&mut commands, &mut readback, &mut cameras);
        return;
    }
    let mode = params.params().render.mode;
    let mut planner = PassPlanner {
        mode,
        paint: &mut paint,
        host: &targets.host,
        cameras: Vec::new(),
        paint_changed: false,
    };
    let result = graph.run_frame(&mut planner);
    let (activations, paint_changed) = (planner.cameras, planner.paint_changed);
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            warn!("frame skipped: {e}");
            between_ticks(&mut commands, &mut readback, &mut cameras);
            return;
        }
    };

    for (pass, mut camera) in &mut cameras {
        if let Some(active) = camera_active(pass.0, Some(activations.as_slice())) {
            camera.is_active = active;
        }
    }
    if paint_changed || paint.needs_upload {
        match targets.upload(&mut images, PAINT, paint.layer.as_bytes()) {
            Ok(()) => {
                // 重新上传后 GPU 纹理是新的，材质绑定组要跟着重建
                for handle in [&assets.terrain, &assets.uv_terrain] {
                    materials.get_mut(handle);
                }
            }
            Err(e) => warn!("paint upload failed: {e}"),
        }
        paint.needs_upload = false;
    }

    // 只在绘制时回读 UV-id 目标
    let handle = targets.handle(UV_ID);
    let wanted = handle.is_some() && report.rendered.contains(&UV_ID_PASS);
    match (readback.transition(wanted), handle) {
        (Some(true), Some(handle)) => {
            readback.requested = targets.host.target_size(UV_ID);
            commands.entity(readback.entity).insert(Readback::texture(handle));
        }
        (Some(false), _) => {
            commands.entity(readback.entity).remove::<Readback>();
        }
        _ => {}
    }
    last.0 = report;
}

/// A display frame without a tick: offscreen cameras off, no readback.
fn between_ticks(commands: &mut Commands, readback: &mut UvReadback, cameras: &mut Query<(&PassCamera, &mut Camera)>) {
    for (pass, mut camera) in cameras.iter_mut() {
        if let Some(active) = camera_active(pass.0, None) {
            camera.is_active = active;
        }
    }
    if readback.transition(false).is_some() {
        commands.entity(readback.entity).remove::<Readback>();
    }
}

/// Observer: a UV-id readback finished; refresh the host mirror the paint controller reads.
pub fn on_uv_readback(trigger: Trigger<ReadbackComplete>, readback: Res<UvReadback>, mut targets: ResMut<BevyTargets>) {
    let Some((width, height)) = readback.requested else {
        return;
    };
    if let Err(e) = targets.host.upload_readback(UV_ID, width, height, &trigger.event().0) {
        debug!("dropped UV readback: {e}");
    }
}

pub fn resize_targets(
    mut commands: Commands,
    mut resized: EventReader<WindowResized>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut graph: ResMut<TerrainGraph>,
    mut targets: ResMut<BevyTargets>,
    mut images: ResMut<Assets<Image>>,
    mut readback: ResMut<UvReadback>,
) {
    if resized.read().last().is_none() {
        return;
    }
    let Ok(window) = windows.get_single() else {
        return;
    };
    let (width, height) = (window.physical_width(), window.physical_height());
    let mut provider = ImageTargets { images: &mut images, targets: &mut targets };
    match graph.resize_viewport(width, height, &mut provider) {
        Ok(ids) if !ids.is_empty() => {
            info!("viewport {}x{}: reallocated {:?}", width, height, ids);
            // 旧尺寸的回读已失效
            readback.requested = None;
            if readback.transition(false).is_some() {
                commands.entity(readback.entity).remove::<Readback>();
            }
        }
        Ok(_) => {}
        Err(e) => warn!("viewport resize failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrain_engine::pipeline::terrain_graph;
    use terrain_engine::{PointerEvent, TargetSizing};

    fn planner_run(mode: RenderMode, paint: &mut PaintSession, host: &HostTargets) -> (FrameReport, Vec<(&'static str, bool)>) {
        let mut graph = terrain_graph(32, (64, 64)).unwrap();
        let mut planner = PassPlanner { mode, paint, host, cameras: Vec::new(), paint_changed: false };
        let report = graph.run_frame(&mut planner).unwrap();
        (report, planner.cameras)
    }

    #[test]
    fn cpu_mode_only_draws_the_screen() {
        let mut paint = PaintSession::new(32, Brush::default());
        let host = HostTargets::new();
        let (report, cameras) = planner_run(RenderMode::CpuMesh, &mut paint, &host);
        assert_eq!(report.rendered, vec![TERRAIN_PASS]);
        assert_eq!(cameras, vec![(HEIGHTMAP_PASS, false), (UV_ID_PASS, false), (TERRAIN_PASS, true)]);
    }

    #[test]
    fn gpu_mode_paints_from_the_host_mirror() {
        let mut host = HostTargets::new();
        let desc = terrain_engine::TargetDesc { id: UV_ID, sizing: TargetSizing::Viewport, format: terrain_engine::TargetFormat::Rgba8Unorm };
        host.create_target(&desc, 64, 64).unwrap();
        host.write_pixels(UV_ID, &[128; 64 * 64 * 4]).unwrap();

        let mut paint = PaintSession::new(32, Brush::default());
        paint.controller.handle_event(PointerEvent::Move { x: 10.0, y: 10.0 });
        paint.controller.handle_event(PointerEvent::Down);
        let (report, cameras) = planner_run(RenderMode::GpuShaded, &mut paint, &host);
        assert_eq!(report.rendered, vec![HEIGHTMAP_PASS, UV_ID_PASS, BRUSH_PASS, TERRAIN_PASS]);
        assert_eq!(cameras[1], (UV_ID_PASS, true));
        assert!(paint.last_stamp.is_some());
        assert!(paint.layer.get(16, 16).unwrap() > 0.0);
    }

    #[test]
    fn gpu_heightmap_renders_on_every_tick() {
        let mut paint = PaintSession::new(32, Brush::default());
        let host = HostTargets::new();
        for _ in 0..3 {
            let (report, cameras) = planner_run(RenderMode::GpuShaded, &mut paint, &host);
            assert!(report.rendered.contains(&HEIGHTMAP_PASS));
            assert_eq!(cameras[0], (HEIGHTMAP_PASS, true));
        }
    }

    #[test]
    fn offscreen_cameras_are_off_between_ticks() {
        let plan = [(HEIGHTMAP_PASS, true), (UV_ID_PASS, true), (TERRAIN_PASS, true)];
        assert_eq!(camera_active(UV_ID_PASS, Some(&plan[..])), Some(true));
        assert_eq!(camera_active(BRUSH_PASS, Some(&plan[..])), None);
        assert_eq!(camera_active(HEIGHTMAP_PASS, None), Some(false));
        assert_eq!(camera_active(UV_ID_PASS, None), Some(false));
        assert_eq!(camera_active(TERRAIN_PASS, None), None);
    }

    #[test]
    fn readback_is_attached_only_on_painting_ticks() {
        let mut readback = UvReadback::new(Entity::PLACEHOLDER);
        // painting tick, idle frame, painting tick, painting tick, released
        assert_eq!(readback.transition(true), Some(true));
        assert_eq!(readback.transition(false), Some(false));
        assert_eq!(readback.transition(true), Some(true));
        assert_eq!(readback.transition(true), None);
        assert_eq!(readback.transition(false), Some(false));
        assert_eq!(readback.transition(false), None);
        assert!(!readback.attached);
    }
}
