use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use terrain_engine::{build_displaced_grid, build_grid, NoiseEvaluator, TerrainError, TerrainParams};

/// Flat indexed grid; heights are applied by `TerrainMaterial` in the vertex stage.
pub fn gpu_grid_mesh(params: &TerrainParams) -> Result<Mesh, TerrainError> {
    let grid = build_grid(params.grid.size, params.grid.resolution)?;
    let positions = grid.world_positions(params.grid.size);
    Ok(Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, grid.positions)
        .with_inserted_indices(Indices::U32(grid.indices)))
}

/// Non-indexed grid displaced by CPU noise, with flat normals.
pub fn cpu_grid_mesh(params: &TerrainParams) -> Result<Mesh, TerrainError> {
    let noise = NoiseEvaluator::new(&params.noise)?;
    let grid = build_displaced_grid(params.grid.size, params.grid.resolution, &noise)?;
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, grid.positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, grid.uvs);
    mesh.compute_flat_normals();
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::render::mesh::VertexAttributeValues;

    fn small() -> TerrainParams {
        let mut params = TerrainParams::default();
        params.grid.resolution = 4;
        params
    }

    #[test]
    fn gpu_mesh_is_indexed_and_flat() {
        let mesh = gpu_grid_mesh(&small()).unwrap();
        assert_eq!(mesh.count_vertices(), 25);
        assert_eq!(mesh.indices().map(|i| i.len()), Some(96));
        let Some(VertexAttributeValues::Float32x3(positions)) = mesh.attribute(Mesh::ATTRIBUTE_POSITION) else {
            panic!("positions missing");
        };
        assert!(positions.iter().all(|p| p[1] == 0.0));
    }

    #[test]
    fn cpu_mesh_has_one_normal_per_vertex() {
        let mesh = cpu_grid_mesh(&small()).unwrap();
        assert_eq!(mesh.count_vertices(), 96);
        assert!(mesh.indices().is_none());
        let Some(VertexAttributeValues::Float32x3(normals)) = mesh.attribute(Mesh::ATTRIBUTE_NORMAL) else {
            panic!("normals missing");
        };
        assert!(normals.iter().all(|n| n[1] > 0.0));
    }
}
