//! Planar grid topology for the heightfield.
//!
//! World mapping shared by every path (CPU mesh, GPU vertex stage, heightmap pass):
//! `x = (u - 0.5) * size`, `z = (0.5 - v) * size`, with `(u, v)` in `[0, 1]`.
//! Row `v = 0` is the far (+z) edge, matching texture row 0 of the heightmap.

use crate::api::{HeightSource, TerrainError};
use crate::params::MAX_RESOLUTION;

#[derive(Debug, Clone, PartialEq)]
pub struct IndexedGrid {
    pub resolution: u32,
    /// Normalized `(u, v)` positions, row-major, `(resolution + 1)^2` of them.
    pub positions: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl IndexedGrid {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Flat world positions (`y = 0`); height comes from the shading stage.
    pub fn world_positions(&self, size: f32) -> Vec<[f32; 3]> {
        self.positions
            .iter()
            .map(|&[u, v]| {
                let [x, z] = uv_to_world(u, v, size);
                [x, 0.0, z]
            })
            .collect()
    }
}

/// Non-indexed triangles with heights baked in.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplacedGrid {
    pub resolution: u32,
    /// Six vertices per cell.
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
}

pub fn uv_to_world(u: f32, v: f32, size: f32) -> [f32; 2] {
    [(u - 0.5) * size, (0.5 - v) * size]
}

fn check(size: f32, resolution: u32) -> Result<(), TerrainError> {
    if !(size.is_finite() && size > 0.0) {
        return Err(TerrainError::invalid("size", size, "must be > 0"));
    }
    if resolution < 1 || resolution > MAX_RESOLUTION {
        return Err(TerrainError::invalid("resolution", resolution, "must be in 1..=1024"));
    }
    Ok(())
}

/// Indexed topology: shared corners, two triangles `(a, b, c)` and `(b, d, c)` per cell.
pub fn build_grid(size: f32, resolution: u32) -> Result<IndexedGrid, TerrainError> {
    check(size, resolution)?;
    let res = resolution;
    let stride = res + 1;
    let inv = 1.0 / res as f32;

    let mut positions = Vec::with_capacity((stride * stride) as usize);
    for row in 0..stride {
        for col in 0..stride {
            positions.push([col as f32 * inv, row as f32 * inv]);
        }
    }

    let mut indices = Vec::with_capacity((6 * res * res) as usize);
    for row in 0..res {
        for col in 0..res {
            let a = row * stride + col;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }

    Ok(IndexedGrid { resolution, positions, indices })
}

/// Non-indexed topology with heights from `heights`, evaluated at each cell's four corners.
pub fn build_displaced_grid(size: f32, resolution: u32, heights: &impl HeightSource) -> Result<DisplacedGrid, TerrainError> {
    check(size, resolution)?;
    let res = resolution;
    let inv = 1.0 / res as f32;
    let count = (6 * res * res) as usize;
    let mut positions = Vec::with_capacity(count);
    let mut uvs = Vec::with_capacity(count);

    let corner = |col: u32, row: u32| {
        let (u, v) = (col as f32 * inv, row as f32 * inv);
        let [x, z] = uv_to_world(u, v, size);
        ([x, heights.height_at(x, z), z], [u, v])
    };

    for row in 0..res {
        for col in 0..res {
            // 每个格子独立求四个角的高度（不共享）
            let a = corner(col, row);
            let b = corner(col + 1, row);
            let c = corner(col, row + 1);
            let d = corner(col + 1, row + 1);
            for (p, uv) in [a, b, c, b, d, c] {
                positions.push(p);
                uvs.push(uv);
            }
        }
    }

    Ok(DisplacedGrid { resolution, positions, uvs })
}
