use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::prelude::*;
use bevy::render::mesh::MeshVertexBufferLayoutRef;
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderRef, ShaderType, SpecializedMeshPipelineError,
};
use bevy::sprite::Material2d;
use terrain_engine::{GridParameters, NoiseParameters, TerrainParams};

pub const NOISE_SHADER: &str = "shaders/noise_height.wgsl";
pub const TERRAIN_SHADER: &str = "shaders/terrain.wgsl";

#[derive(ShaderType, Debug, Clone, Copy, Default)]
pub struct NoiseUniform {
    pub offset: Vec2,
    pub amplitude: f32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub scale: f32,
    /// World extent covered by the heightmap.
    pub size: f32,
    pub octaves: u32,
    pub mode: u32,
    pub seed: u32,
}

impl NoiseUniform {
    pub fn new(noise: &NoiseParameters, grid: &GridParameters) -> Self {
        Self {
            offset: Vec2::new(noise.offset_x, noise.offset_y),
            amplitude: noise.amplitude,
            persistence: noise.persistence,
            lacunarity: noise.lacunarity,
            scale: noise.scale,
            size: grid.size,
            octaves: noise.octaves,
            mode: noise.mode.shader_index(),
            seed: noise.seed,
        }
    }
}

/// Full-target quad that evaluates the fractal sum per texel into the height target.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
pub struct NoiseMaterial {
    #[uniform(0)]
    pub settings: NoiseUniform,
}

impl Material2d for NoiseMaterial {
    fn fragment_shader() -> ShaderRef {
        NOISE_SHADER.into()
    }
}

#[derive(ShaderType, Debug, Clone, Copy, Default)]
pub struct TerrainUniform {
    pub color: Vec4,
    pub size: f32,
    pub paint_height: f32,
    /// Height/paint target edge length in texels.
    pub map_size: f32,
    /// Largest possible |height|, for height-based tinting.
    pub height_range: f32,
}

impl TerrainUniform {
    pub fn new(params: &TerrainParams, map_size: u32) -> Self {
        let noise = &params.noise;
        let height_range = (0..noise.octaves).map(|i| noise.amplitude * noise.persistence.powi(i as i32)).sum::<f32>();
        Self {
            color: tint(params.render.color),
            size: params.grid.size,
            paint_height: params.brush.paint_height,
            map_size: map_size as f32,
            height_range: height_range.max(1e-3),
        }
    }
}

/// Indexed terrain grid displaced in the vertex stage by `height + paint * paint_height`.
///
/// With `uv_id` set the fragment stage writes `(u, v, 1, 1)` instead of shading; that variant
/// is what the UV-id camera renders.
#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
#[bind_group_data(TerrainMaterialKey)]
pub struct TerrainMaterial {
    #[uniform(0)]
    pub settings: TerrainUniform,
    #[texture(1)]
    pub height: Handle<Image>,
    #[texture(2, sample_type = "float", filterable = false)]
    pub paint: Handle<Image>,
    pub uv_id: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerrainMaterialKey {
    uv_id: bool,
}

impl From<&TerrainMaterial> for TerrainMaterialKey {
    fn from(material: &TerrainMaterial) -> Self {
        Self { uv_id: material.uv_id }
    }
}

impl Material for TerrainMaterial {
    fn vertex_shader() -> ShaderRef {
        TERRAIN_SHADER.into()
    }

    fn fragment_shader() -> ShaderRef {
        TERRAIN_SHADER.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        layout: &MeshVertexBufferLayoutRef,
        key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let vertex_layout =
            layout.0.get_layout(&[Mesh::ATTRIBUTE_POSITION.at_shader_location(0), Mesh::ATTRIBUTE_UV_0.at_shader_location(1)])?;
        descriptor.vertex.buffers = vec![vertex_layout];
        if key.bind_group_data.uv_id {
            descriptor.vertex.shader_defs.push("UV_ID".into());
            if let Some(fragment) = descriptor.fragment.as_mut() {
                fragment.shader_defs.push("UV_ID".into());
            }
        }
        Ok(())
    }
}

pub fn tint(color: [f32; 3]) -> Vec4 {
    Vec4::new(color[0], color[1], color[2], 1.0)
}
