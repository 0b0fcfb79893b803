//! Pointer-driven heightmap painting.
//!
//! The UV-id pass encodes the terrain's `(u, v)` into the red/green channels of a
//! viewport-sized target, with blue marking "terrain hit". The controller reads back the
//! pixel under the pointer, turns it into a [`BrushStamp`] in heightmap pixel space, and the
//! brush pass composites that stamp into a [`HeightLayer`].

use crate::api::{TargetProvider, TerrainError};
use crate::params::BrushParameters;
use crate::target::TargetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintState {
    #[default]
    Idle,
    Painting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Raise the layer.
    #[default]
    Additive,
    /// Erase toward zero.
    Subtractive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Viewport pixels, origin top-left.
    Move { x: f32, y: f32 },
    Down,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushStroke {
    pub pointer: (f32, f32),
    pub active: bool,
    pub blend: BlendMode,
}

/// Grayscale brush mask, row-major, weights in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BrushTexture {
    width: u32,
    height: u32,
    weights: Vec<f32>,
}

impl BrushTexture {
    pub fn from_luma8(width: u32, height: u32, pixels: &[u8]) -> Result<Self, TerrainError> {
        if width == 0 || height == 0 || pixels.len() != (width * height) as usize {
            return Err(TerrainError::invalid("brush_texture", format!("{width}x{height}, {} bytes", pixels.len()), "size mismatch"));
        }
        Ok(Self { width, height, weights: pixels.iter().map(|&p| p as f32 / 255.0).collect() })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Nearest sample at normalized `(s, t)` in `[0, 1]`.
    pub fn sample(&self, s: f32, t: f32) -> f32 {
        let x = ((s.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width - 1);
        let y = ((t.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height - 1);
        self.weights[(y * self.width + x) as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BrushShape {
    /// Round brush, smoothstep falloff to zero at the radius.
    #[default]
    Falloff,
    Texture(BrushTexture),
}

impl BrushShape {
    /// Weight at offset `(dx, dy)` from the center, in units of the radius.
    pub fn weight(&self, dx: f32, dy: f32) -> f32 {
        match self {
            BrushShape::Falloff => {
                let d = (dx * dx + dy * dy).sqrt();
                if d >= 1.0 {
                    return 0.0;
                }
                let t = 1.0 - d;
                t * t * (3.0 - 2.0 * t)
            }
            BrushShape::Texture(tex) => {
                if dx.abs() > 1.0 || dy.abs() > 1.0 {
                    return 0.0;
                }
                tex.sample((dx + 1.0) * 0.5, (dy + 1.0) * 0.5)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub shape: BrushShape,
    /// Heightmap pixels.
    pub radius: f32,
    pub strength: f32,
    pub blend: BlendMode,
}

impl Default for Brush {
    fn default() -> Self {
        Self::from_params(&BrushParameters::default(), BrushShape::Falloff)
    }
}

impl Brush {
    pub fn from_params(params: &BrushParameters, shape: BrushShape) -> Self {
        Self {
            shape,
            radius: params.radius.max(0.5),
            strength: params.strength.clamp(0.0, 1.0),
            blend: if params.erase { BlendMode::Subtractive } else { BlendMode::Additive },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushStamp {
    /// Heightmap pixel space.
    pub center: [f32; 2],
    pub radius: f32,
    pub strength: f32,
    pub blend: BlendMode,
}

/// Decode one RGBA8 UV-id pixel. `None` when the pixel is not terrain.
pub fn decode_uv(rgba: &[u8]) -> Option<[f32; 2]> {
    match rgba {
        [r, g, b, ..] if *b >= 128 => Some([*r as f32 / 255.0, *g as f32 / 255.0]),
        _ => None,
    }
}

/// Heightmap pixels one UV step covers: the error bound of a decoded stamp center.
pub fn decode_tolerance(layer_size: (u32, u32)) -> [f32; 2] {
    [layer_size.0 as f32 / 255.0, layer_size.1 as f32 / 255.0]
}

#[derive(Debug, Clone)]
pub struct PaintController {
    state: PaintState,
    pointer: (f32, f32),
    /// Set on the first move; a pointer never seen moving does not paint.
    pointer_seen: bool,
    uv_target: TargetId,
    layer_size: (u32, u32),
    last_uv: Option<[f32; 2]>,
}

impl PaintController {
    pub fn new(uv_target: TargetId, layer_size: (u32, u32)) -> Self {
        Self {
            state: PaintState::Idle,
            pointer: (0.0, 0.0),
            pointer_seen: false,
            uv_target,
            layer_size: (layer_size.0.max(1), layer_size.1.max(1)),
            last_uv: None,
        }
    }

    pub fn state(&self) -> PaintState {
        self.state
    }

    pub fn pointer(&self) -> Option<(f32, f32)> {
        self.pointer_seen.then_some(self.pointer)
    }

    /// Last UV decoded under the pointer while painting.
    pub fn last_uv(&self) -> Option<[f32; 2]> {
        self.last_uv
    }

    pub fn stroke(&self, blend: BlendMode) -> BrushStroke {
        BrushStroke { pointer: self.pointer, active: self.state == PaintState::Painting, blend }
    }

    pub fn handle_event(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Move { x, y } => {
                self.pointer = (x, y);
                self.pointer_seen = true;
            }
            PointerEvent::Down => self.state = PaintState::Painting,
            PointerEvent::Up => {
                self.state = PaintState::Idle;
                self.last_uv = None;
            }
        }
    }

    /// One tick. Returns the stamp to composite, if any.
    ///
    /// A UV-id target that has not rendered yet keeps the controller inert for this tick.
    pub fn tick(&mut self, provider: &impl TargetProvider, brush: &Brush) -> Result<Option<BrushStamp>, TerrainError> {
        if self.state != PaintState::Painting || !self.pointer_seen {
            return Ok(None);
        }
        let (w, h) = provider.target_size(self.uv_target).ok_or(TerrainError::UnknownTarget(self.uv_target.as_str()))?;
        let (x, y) = self.pointer;
        if !(x >= 0.0 && y >= 0.0 && x < w as f32 && y < h as f32) {
            return Ok(None);
        }

        let pixel = match provider.read_pixels(self.uv_target, x as u32, y as u32, 1, 1) {
            Ok(pixel) => pixel,
            Err(TerrainError::StaleReadback { target }) => {
                log::debug!("paint tick skipped: `{target}` not rendered yet");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some([u, v]) = decode_uv(&pixel) else {
            self.last_uv = None;
            return Ok(None);
        };
        self.last_uv = Some([u, v]);

        let (lw, lh) = self.layer_size;
        Ok(Some(BrushStamp {
            center: [u * lw as f32, v * lh as f32],
            radius: brush.radius,
            strength: brush.strength,
            blend: brush.blend,
        }))
    }
}

/// Host-side paint layer, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightLayer {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl HeightLayer {
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self { width, height, data: vec![0.0; (width * height) as usize] }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.data[(y * self.width + x) as usize])
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Raw `R32Float` texel bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }

    /// Composite one stamp. Returns true if any texel changed.
    pub fn apply_stamp(&mut self, stamp: &BrushStamp, shape: &BrushShape) -> bool {
        let r = stamp.radius.max(0.5);
        let [cx, cy] = stamp.center;
        let x0 = (cx - r).floor().max(0.0) as u32;
        let y0 = (cy - r).floor().max(0.0) as u32;
        let x1 = ((cx + r).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((cy + r).ceil().max(0.0) as u32).min(self.height);

        let mut changed = false;
        for y in y0..y1 {
            for x in x0..x1 {
                let w = shape.weight((x as f32 + 0.5 - cx) / r, (y as f32 + 0.5 - cy) / r);
                if w <= 0.0 {
                    continue;
                }
                let texel = &mut self.data[(y * self.width + x) as usize];
                let delta = stamp.strength * w;
                let next = match stamp.blend {
                    BlendMode::Additive => (*texel + delta).min(1.0),
                    BlendMode::Subtractive => (*texel - delta).max(0.0),
                };
                changed |= next != *texel;
                *texel = next;
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{HostTargets, TargetDesc, TargetFormat, TargetSizing};

    const UV: TargetId = TargetId::new("uv_id");

    /// A 256x256 UV-id target where pixel (x, y) encodes (u, v) = (x/255, y/255).
    fn gradient_target() -> HostTargets {
        let mut host = HostTargets::new();
        let desc = TargetDesc { id: UV, sizing: TargetSizing::Viewport, format: TargetFormat::Rgba8Unorm };
        host.create_target(&desc, 256, 256).unwrap();
        let mut data = Vec::with_capacity(256 * 256 * 4);
        for y in 0..256u32 {
            for x in 0..256u32 {
                data.extend_from_slice(&[x as u8, y as u8, 255, 255]);
            }
        }
        host.write_pixels(UV, &data).unwrap();
        host
    }

    fn painting_at(x: f32, y: f32) -> PaintController {
        let mut c = PaintController::new(UV, (512, 512));
        c.handle_event(PointerEvent::Move { x, y });
        c.handle_event(PointerEvent::Down);
        c
    }

    #[test]
    fn pointer_down_over_gradient_stamps_at_decoded_uv() {
        let host = gradient_target();
        let mut c = painting_at(100.0, 100.0);
        assert_eq!(c.state(), PaintState::Painting);
        let stamp = c.tick(&host, &Brush::default()).unwrap().unwrap();

        let tol = decode_tolerance((512, 512));
        let expected = 100.0 / 255.0 * 512.0;
        assert!((stamp.center[0] - expected).abs() <= tol[0]);
        assert!((stamp.center[1] - expected).abs() <= tol[1]);
        assert_eq!(c.last_uv(), Some([100.0 / 255.0, 100.0 / 255.0]));
        assert_eq!(stamp.blend, BlendMode::Additive);
    }

    #[test]
    fn idle_or_unseen_pointer_does_not_paint() {
        let host = gradient_target();
        let mut idle = PaintController::new(UV, (512, 512));
        idle.handle_event(PointerEvent::Move { x: 10.0, y: 10.0 });
        assert_eq!(idle.tick(&host, &Brush::default()).unwrap(), None);

        // pressed before ever moving: the origin is not a real position
        let mut unseen = PaintController::new(UV, (512, 512));
        unseen.handle_event(PointerEvent::Down);
        assert_eq!(unseen.pointer(), None);
        assert_eq!(unseen.tick(&host, &Brush::default()).unwrap(), None);

        let mut released = painting_at(5.0, 5.0);
        released.handle_event(PointerEvent::Up);
        assert_eq!(released.state(), PaintState::Idle);
        assert_eq!(released.tick(&host, &Brush::default()).unwrap(), None);
    }

    #[test]
    fn pointer_at_origin_paints_once_seen() {
        let host = gradient_target();
        let mut c = painting_at(0.0, 0.0);
        let stamp = c.tick(&host, &Brush::default()).unwrap().unwrap();
        assert_eq!(stamp.center, [0.0, 0.0]);
    }

    #[test]
    fn unrendered_target_keeps_controller_inert() {
        let mut host = HostTargets::new();
        let desc = TargetDesc { id: UV, sizing: TargetSizing::Viewport, format: TargetFormat::Rgba8Unorm };
        host.create_target(&desc, 64, 64).unwrap();
        let mut c = painting_at(3.0, 3.0);
        assert_eq!(c.tick(&host, &Brush::default()), Ok(None));
        assert_eq!(c.state(), PaintState::Painting);
    }

    #[test]
    fn misses_and_outside_pointer_paint_nothing() {
        let mut host = gradient_target();
        let mut c = painting_at(300.0, 20.0);
        assert_eq!(c.tick(&host, &Brush::default()).unwrap(), None);

        host.write_pixels(UV, &vec![0; 256 * 256 * 4]).unwrap();
        let mut c = painting_at(20.0, 20.0);
        assert_eq!(c.tick(&host, &Brush::default()).unwrap(), None);
        assert_eq!(c.last_uv(), None);
    }

    #[test]
    fn decode_requires_terrain_flag() {
        assert_eq!(decode_uv(&[255, 0, 128, 255]), Some([1.0, 0.0]));
        assert_eq!(decode_uv(&[255, 0, 127, 255]), None);
        assert_eq!(decode_uv(&[1, 2]), None);
    }

    #[test]
    fn stamps_accumulate_and_erase_within_bounds() {
        let mut layer = HeightLayer::new(32, 32);
        let add = BrushStamp { center: [16.0, 16.0], radius: 4.0, strength: 0.4, blend: BlendMode::Additive };
        for _ in 0..5 {
            layer.apply_stamp(&add, &BrushShape::Falloff);
        }
        assert_eq!(layer.get(15, 15), Some(1.0));
        assert_eq!(layer.get(0, 0), Some(0.0));
        assert!(layer.data().iter().all(|v| (0.0..=1.0).contains(v)));

        let erase = BrushStamp { blend: BlendMode::Subtractive, strength: 1.0, ..add };
        for _ in 0..3 {
            layer.apply_stamp(&erase, &BrushShape::Falloff);
        }
        assert_eq!(layer.get(15, 15), Some(0.0));
        assert!(!layer.apply_stamp(&BrushStamp { center: [-40.0, -40.0], ..add }, &BrushShape::Falloff));
    }

    #[test]
    fn falloff_is_strongest_at_center() {
        let shape = BrushShape::Falloff;
        assert_eq!(shape.weight(0.0, 0.0), 1.0);
        assert!(shape.weight(0.5, 0.0) < 1.0 && shape.weight(0.5, 0.0) > 0.0);
        assert_eq!(shape.weight(1.0, 0.0), 0.0);
    }

    #[test]
    fn texture_brush_samples_mask() {
        let tex = BrushTexture::from_luma8(2, 1, &[0, 255]).unwrap();
        let shape = BrushShape::Texture(tex);
        assert_eq!(shape.weight(-0.5, 0.0), 0.0);
        assert_eq!(shape.weight(0.5, 0.0), 1.0);
        assert!(BrushTexture::from_luma8(2, 2, &[0; 3]).is_err());
    }

    #[test]
    fn layer_bytes_are_r32_float() {
        let mut layer = HeightLayer::new(2, 1);
        layer.apply_stamp(
            &BrushStamp { center: [0.5, 0.5], radius: 0.5, strength: 0.25, blend: BlendMode::Additive },
            &BrushShape::Falloff,
        );
        assert_eq!(layer.as_bytes().len(), 8);
        assert_eq!(&layer.as_bytes()[..4], &0.25f32.to_ne_bytes());
        layer.clear();
        assert!(layer.data().iter().all(|v| *v == 0.0));
    }
}
