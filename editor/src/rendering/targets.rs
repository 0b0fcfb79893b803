use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};
use terrain_engine::{HostTargets, TargetDesc, TargetFormat, TargetId, TargetProvider, TerrainError};

/// GPU images backing the graph's targets, plus the host mirror that readbacks land in.
#[derive(Resource, Default)]
pub struct BevyTargets {
    handles: HashMap<TargetId, Handle<Image>>,
    pub host: HostTargets,
}

impl BevyTargets {
    pub fn handle(&self, id: TargetId) -> Option<Handle<Image>> {
        self.handles.get(&id).cloned()
    }

    /// Replace a target's texels from the host (the paint layer).
    pub fn upload(&mut self, images: &mut Assets<Image>, id: TargetId, bytes: &[u8]) -> Result<(), TerrainError> {
        let handle = self.handles.get(&id).ok_or(TerrainError::UnknownTarget(id.as_str()))?;
        let image = images.get_mut(handle).ok_or(TerrainError::UnknownTarget(id.as_str()))?;
        if image.data.len() != bytes.len() {
            let size = image.size();
            return Err(TerrainError::ResizeInconsistency {
                target: id.as_str(),
                expected: (size.x, size.y),
                actual: (bytes.len() as u32 / 4, 1),
            });
        }
        image.data.copy_from_slice(bytes);
        self.host.write_pixels(id, bytes)
    }
}

/// `TargetProvider` over `Assets<Image>` for the duration of one system call.
pub struct ImageTargets<'a> {
    pub images: &'a mut Assets<Image>,
    pub targets: &'a mut BevyTargets,
}

impl TargetProvider for ImageTargets<'_> {
    fn create_target(&mut self, desc: &TargetDesc, width: u32, height: u32) -> Result<(), TerrainError> {
        let image = target_image(desc.format, width, height);
        match self.targets.handles.get(&desc.id) {
            Some(handle) => self.images.insert(handle, image),
            None => {
                let handle = self.images.add(image);
                self.targets.handles.insert(desc.id, handle);
            }
        }
        debug!("allocated target `{}` {}x{} {:?}", desc.id, width, height, desc.format);
        self.targets.host.create_target(desc, width, height)
    }

    fn resize(&mut self, target: TargetId, width: u32, height: u32) -> Result<(), TerrainError> {
        let handle = self.targets.handles.get(&target).ok_or(TerrainError::UnknownTarget(target.as_str()))?;
        if let Some(image) = self.images.get_mut(handle) {
            image.resize(extent(width, height));
        }
        self.targets.host.resize(target, width, height)
    }

    fn read_pixels(&self, target: TargetId, x: u32, y: u32, w: u32, h: u32) -> Result<Vec<u8>, TerrainError> {
        self.targets.host.read_pixels(target, x, y, w, h)
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.host.target_size(target)
    }
}

fn extent(width: u32, height: u32) -> Extent3d {
    Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 }
}

pub fn texture_format(format: TargetFormat) -> TextureFormat {
    match format {
        TargetFormat::Rgba8Unorm => TextureFormat::Rgba8Unorm,
        TargetFormat::Rgba16Float => TextureFormat::Rgba16Float,
        TargetFormat::R32Float => TextureFormat::R32Float,
    }
}

/// Render-attachment image that can also be sampled, uploaded to and copied out of.
pub fn target_image(format: TargetFormat, width: u32, height: u32) -> Image {
    let mut image = Image::new_fill(
        extent(width, height),
        TextureDimension::D2,
        &vec![0; format.bytes_per_pixel() as usize],
        texture_format(format),
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage = TextureUsages::TEXTURE_BINDING
        | TextureUsages::COPY_DST
        | TextureUsages::COPY_SRC
        | TextureUsages::RENDER_ATTACHMENT;
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrain_engine::TargetSizing;

    #[test]
    fn target_images_match_the_declared_format() {
        let image = target_image(TargetFormat::R32Float, 8, 4);
        assert_eq!(image.texture_descriptor.format, TextureFormat::R32Float);
        assert_eq!(image.data.len(), 8 * 4 * 4);
        assert!(image.texture_descriptor.usage.contains(TextureUsages::COPY_SRC));
    }

    #[test]
    fn image_targets_allocate_resize_and_upload() {
        let mut images = Assets::<Image>::default();
        let mut targets = BevyTargets::default();
        let id = TargetId::new("paint");
        let desc = TargetDesc { id, sizing: TargetSizing::Viewport, format: TargetFormat::R32Float };
        {
            let mut provider = ImageTargets { images: &mut images, targets: &mut targets };
            provider.create_target(&desc, 2, 2).unwrap();
            provider.resize(id, 4, 2).unwrap();
            assert_eq!(provider.target_size(id), Some((4, 2)));
        }
        let handle = targets.handle(id).unwrap();
        assert_eq!(images.get(&handle).unwrap().size(), UVec2::new(4, 2));

        let bytes: Vec<u8> = bytemuck::cast_slice(&[0.5f32; 8]).to_vec();
        targets.upload(&mut images, id, &bytes).unwrap();
        assert_eq!(images.get(&handle).unwrap().data, bytes);
        assert!(targets.host.has_rendered(id));
        assert!(targets.upload(&mut images, id, &bytes[..4]).is_err());
    }
}
