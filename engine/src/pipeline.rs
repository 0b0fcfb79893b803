//! The editor's pass chain: heightmap -> UV-id -> brush -> terrain (screen).

use crate::api::TerrainError;
use crate::graph::RenderGraph;
use crate::target::{TargetFormat, TargetId, TargetSizing};

pub const HEIGHT: TargetId = TargetId::new("height");
pub const UV_ID: TargetId = TargetId::new("uv_id");
pub const PAINT: TargetId = TargetId::new("paint");

pub const HEIGHTMAP_PASS: &str = "heightmap";
pub const UV_ID_PASS: &str = "uv_id";
pub const BRUSH_PASS: &str = "brush";
pub const TERRAIN_PASS: &str = "terrain";

pub const DEFAULT_HEIGHTMAP_SIZE: u32 = 512;

/// Build and compile the terrain graph. `heightmap_size` is the processing resolution of the
/// height and paint targets.
pub fn terrain_graph(heightmap_size: u32, viewport: (u32, u32)) -> Result<RenderGraph, TerrainError> {
    if heightmap_size == 0 {
        return Err(TerrainError::invalid("heightmap_size", heightmap_size, "must be > 0"));
    }
    let map = TargetSizing::Fixed { width: heightmap_size, height: heightmap_size };
    let mut graph = RenderGraph::new(viewport);
    graph
        .add_pass(HEIGHTMAP_PASS, |p| {
            p.write(HEIGHT, map, TargetFormat::Rgba16Float);
        })
        .add_pass(UV_ID_PASS, |p| {
            // 用上一帧的绘制层抬高地形，与屏幕上看到的一致
            p.read(HEIGHT).read_previous(PAINT).write(UV_ID, TargetSizing::Viewport, TargetFormat::Rgba8Unorm);
        })
        .add_pass(BRUSH_PASS, |p| {
            p.read(UV_ID).write(PAINT, map, TargetFormat::R32Float);
        })
        .add_pass(TERRAIN_PASS, |p| {
            p.read(HEIGHT).read(PAINT).to_screen();
        });
    graph.compile()?;
    Ok(graph)
}
