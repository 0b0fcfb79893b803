use std::collections::HashMap;
use std::fmt;

use crate::api::{TargetProvider, TerrainError};

/// wgpu requires texture-to-buffer copies to use rows padded to this many bytes.
pub const COPY_ROW_ALIGNMENT: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(&'static str);

impl TargetId {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSizing {
    Fixed { width: u32, height: u32 },
    /// Follows the viewport; reallocated on resize.
    Viewport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Rgba8Unorm,
    Rgba16Float,
    R32Float,
}

impl TargetFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            TargetFormat::Rgba8Unorm | TargetFormat::R32Float => 4,
            TargetFormat::Rgba16Float => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDesc {
    pub id: TargetId,
    pub sizing: TargetSizing,
    pub format: TargetFormat,
}

/// Graph-side bookkeeping for one offscreen buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    pub desc: TargetDesc,
    pub width: u32,
    pub height: u32,
    /// Set once the writer pass has drawn into the current allocation.
    pub rendered: bool,
    /// Bumped on every reallocation.
    pub generation: u32,
}

impl RenderTarget {
    pub fn new(desc: TargetDesc, viewport: (u32, u32)) -> Self {
        let (width, height) = match desc.sizing {
            TargetSizing::Fixed { width, height } => (width, height),
            TargetSizing::Viewport => viewport,
        };
        Self { desc, width: width.max(1), height: height.max(1), rendered: false, generation: 0 }
    }

    pub fn follows_viewport(&self) -> bool {
        self.desc.sizing == TargetSizing::Viewport
    }
}

#[derive(Debug, Clone)]
struct HostTarget {
    format: TargetFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
    rendered: bool,
}

impl HostTarget {
    fn row_bytes(&self) -> usize {
        (self.width * self.format.bytes_per_pixel()) as usize
    }
}

/// Host-memory render targets. Used as the CPU mirror of GPU targets that are read back,
/// and as the whole target provider in tests.
#[derive(Debug, Clone, Default)]
pub struct HostTargets {
    targets: HashMap<TargetId, HostTarget>,
}

impl HostTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_rendered(&self, target: TargetId) -> bool {
        self.targets.get(&target).is_some_and(|t| t.rendered)
    }

    /// Replace the whole contents of a target with tightly packed rows.
    pub fn write_pixels(&mut self, target: TargetId, data: &[u8]) -> Result<(), TerrainError> {
        let t = self.get_mut(target)?;
        if data.len() != t.data.len() {
            let bpp = t.format.bytes_per_pixel() as usize;
            let rows = (data.len() / t.row_bytes().max(1)) as u32;
            return Err(TerrainError::ResizeInconsistency {
                target: target.as_str(),
                expected: (t.width, t.height),
                actual: ((data.len() / bpp.max(1)) as u32 / rows.max(1), rows),
            });
        }
        t.data.copy_from_slice(data);
        t.rendered = true;
        Ok(())
    }

    /// Accept a GPU readback of `width x height`, with rows either tightly packed or padded
    /// to [`COPY_ROW_ALIGNMENT`]. A readback sized for an older allocation is rejected.
    pub fn upload_readback(&mut self, target: TargetId, width: u32, height: u32, bytes: &[u8]) -> Result<(), TerrainError> {
        let t = self.get_mut(target)?;
        if (width, height) != (t.width, t.height) {
            return Err(TerrainError::ResizeInconsistency {
                target: target.as_str(),
                expected: (t.width, t.height),
                actual: (width, height),
            });
        }
        let row = t.row_bytes();
        let padded = padded_row_bytes(t.width, t.format) as usize;
        let rows = t.height as usize;
        if bytes.len() == row * rows {
            t.data.copy_from_slice(bytes);
        } else if bytes.len() == padded * rows {
            for (dst, src) in t.data.chunks_exact_mut(row).zip(bytes.chunks_exact(padded)) {
                dst.copy_from_slice(&src[..row]);
            }
        } else {
            let bpp = t.format.bytes_per_pixel() as usize;
            return Err(TerrainError::ResizeInconsistency {
                target: target.as_str(),
                expected: (t.width, t.height),
                actual: ((bytes.len() / rows.max(1) / bpp) as u32, t.height),
            });
        }
        t.rendered = true;
        Ok(())
    }

    fn get_mut(&mut self, target: TargetId) -> Result<&mut HostTarget, TerrainError> {
        self.targets.get_mut(&target).ok_or(TerrainError::UnknownTarget(target.as_str()))
    }
}

pub fn padded_row_bytes(width: u32, format: TargetFormat) -> u32 {
    let row = width * format.bytes_per_pixel();
    row.div_ceil(COPY_ROW_ALIGNMENT) * COPY_ROW_ALIGNMENT
}

impl TargetProvider for HostTargets {
    fn create_target(&mut self, desc: &TargetDesc, width: u32, height: u32) -> Result<(), TerrainError> {
        let (width, height) = (width.max(1), height.max(1));
        let len = (width * height * desc.format.bytes_per_pixel()) as usize;
        self.targets.insert(
            desc.id,
            HostTarget { format: desc.format, width, height, data: vec![0; len], rendered: false },
        );
        Ok(())
    }

    fn resize(&mut self, target: TargetId, width: u32, height: u32) -> Result<(), TerrainError> {
        let t = self.get_mut(target)?;
        let (width, height) = (width.max(1), height.max(1));
        if (t.width, t.height) == (width, height) {
            return Ok(());
        }
        t.width = width;
        t.height = height;
        t.data = vec![0; (width * height * t.format.bytes_per_pixel()) as usize];
        t.rendered = false;
        Ok(())
    }

    fn read_pixels(&self, target: TargetId, x: u32, y: u32, w: u32, h: u32) -> Result<Vec<u8>, TerrainError> {
        let t = self.targets.get(&target).ok_or(TerrainError::UnknownTarget(target.as_str()))?;
        if !t.rendered {
            return Err(TerrainError::StaleReadback { target: target.as_str() });
        }
        let in_bounds = x.checked_add(w).is_some_and(|r| r <= t.width) && y.checked_add(h).is_some_and(|b| b <= t.height);
        if !in_bounds {
            return Err(TerrainError::ReadOutOfBounds { target: target.as_str(), x, y, w, h });
        }
        let bpp = t.format.bytes_per_pixel() as usize;
        let row = t.row_bytes();
        let mut out = Vec::with_capacity(w as usize * h as usize * bpp);
        for yy in y as usize..(y + h) as usize {
            let start = yy * row + x as usize * bpp;
            out.extend_from_slice(&t.data[start..start + w as usize * bpp]);
        }
        Ok(out)
    }

    fn target_size(&self, target: TargetId) -> Option<(u32, u32)> {
        self.targets.get(&target).map(|t| (t.width, t.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UV: TargetId = TargetId::new("uv");

    fn uv_desc() -> TargetDesc {
        TargetDesc { id: UV, sizing: TargetSizing::Viewport, format: TargetFormat::Rgba8Unorm }
    }

    #[test]
    fn read_before_render_is_stale() {
        let mut host = HostTargets::new();
        host.create_target(&uv_desc(), 4, 4).unwrap();
        assert_eq!(host.read_pixels(UV, 0, 0, 1, 1), Err(TerrainError::StaleReadback { target: "uv" }));
    }

    #[test]
    fn read_returns_the_requested_window() {
        let mut host = HostTargets::new();
        host.create_target(&uv_desc(), 2, 2).unwrap();
        let data: Vec<u8> = (0..16).collect();
        host.write_pixels(UV, &data).unwrap();
        assert_eq!(host.read_pixels(UV, 1, 1, 1, 1).unwrap(), vec![12, 13, 14, 15]);
        assert_eq!(host.read_pixels(UV, 0, 1, 2, 1).unwrap(), (8..16).collect::<Vec<u8>>());
        assert!(matches!(host.read_pixels(UV, 2, 0, 1, 1), Err(TerrainError::ReadOutOfBounds { .. })));
    }

    #[test]
    fn padded_readback_rows_are_stripped() {
        let mut host = HostTargets::new();
        host.create_target(&uv_desc(), 3, 2).unwrap();
        let padded = padded_row_bytes(3, TargetFormat::Rgba8Unorm) as usize;
        assert_eq!(padded, 256);
        let mut bytes = vec![0xAA; padded * 2];
        bytes[..12].copy_from_slice(&[1; 12]);
        bytes[padded..padded + 12].copy_from_slice(&[2; 12]);
        host.upload_readback(UV, 3, 2, &bytes).unwrap();
        assert_eq!(host.read_pixels(UV, 2, 0, 1, 1).unwrap(), vec![1; 4]);
        assert_eq!(host.read_pixels(UV, 0, 1, 3, 1).unwrap(), vec![2; 12]);
    }

    #[test]
    fn resize_invalidates_and_rejects_old_readbacks() {
        let mut host = HostTargets::new();
        host.create_target(&uv_desc(), 2, 2).unwrap();
        host.write_pixels(UV, &[7; 16]).unwrap();
        host.resize(UV, 4, 2).unwrap();
        assert!(!host.has_rendered(UV));
        assert_eq!(host.target_size(UV), Some((4, 2)));
        assert!(matches!(
            host.upload_readback(UV, 2, 2, &[7; 16]),
            Err(TerrainError::ResizeInconsistency { expected: (4, 2), actual: (2, 2), .. })
        ));
    }
}
