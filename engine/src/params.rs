use serde::{Deserialize, Serialize};

use crate::api::TerrainError;
use crate::cadence::FrameCadence;

pub const MIN_PERSISTENCE: f32 = 0.01;
pub const MAX_OCTAVES: u32 = 12;
pub const MAX_RESOLUTION: u32 = 1024;

/// How the per-octave frequency grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FractalMode {
    /// `amp *= persistence; freq *= lacunarity`
    #[default]
    Independent,
    /// `amp *= persistence; freq /= persistence` (lacunarity ignored)
    Coupled,
}

impl FractalMode {
    pub fn shader_index(self) -> u32 {
        match self {
            FractalMode::Independent => 0,
            FractalMode::Coupled => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParameters {
    pub amplitude: f32,
    pub persistence: f32,
    pub octaves: u32,
    pub lacunarity: f32,
    /// Base frequency of the first octave.
    pub scale: f32,
    pub seed: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub mode: FractalMode,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        Self {
            amplitude: 2.0,
            persistence: 0.5,
            octaves: 5,
            lacunarity: 2.0,
            scale: 0.2,
            seed: 42,
            offset_x: 0.0,
            offset_y: 0.0,
            mode: FractalMode::Independent,
        }
    }
}

impl NoiseParameters {
    pub fn validate(&self) -> Result<(), TerrainError> {
        if !(self.amplitude.is_finite() && self.amplitude > 0.0) {
            return Err(TerrainError::invalid("amplitude", self.amplitude, "must be > 0"));
        }
        if !(self.persistence.is_finite() && self.persistence > 0.0 && self.persistence <= 1.0) {
            return Err(TerrainError::invalid("persistence", self.persistence, "must be in (0, 1]"));
        }
        if self.octaves > MAX_OCTAVES {
            return Err(TerrainError::invalid("octaves", self.octaves, "too many octaves"));
        }
        if !(self.lacunarity.is_finite() && self.lacunarity >= 1.0) {
            return Err(TerrainError::invalid("lacunarity", self.lacunarity, "must be >= 1"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(TerrainError::invalid("scale", self.scale, "must be > 0"));
        }
        if !self.offset_x.is_finite() {
            return Err(TerrainError::invalid("offset_x", self.offset_x, "must be finite"));
        }
        if !self.offset_y.is_finite() {
            return Err(TerrainError::invalid("offset_y", self.offset_y, "must be finite"));
        }
        Ok(())
    }

    /// Clamp every field into its declared range. NaN falls back to the default value.
    pub fn sanitized(&self) -> Self {
        let d = Self::default();
        Self {
            amplitude: clamp_or(self.amplitude, ParamKey::Amplitude, d.amplitude),
            persistence: clamp_or(self.persistence, ParamKey::Persistence, d.persistence),
            octaves: self.octaves.min(MAX_OCTAVES),
            lacunarity: clamp_or(self.lacunarity, ParamKey::Lacunarity, d.lacunarity),
            scale: clamp_or(self.scale, ParamKey::Scale, d.scale),
            seed: self.seed,
            offset_x: if self.offset_x.is_finite() { self.offset_x } else { 0.0 },
            offset_y: if self.offset_y.is_finite() { self.offset_y } else { 0.0 },
            mode: self.mode,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParameters {
    pub size: f32,
    pub resolution: u32,
}

impl Default for GridParameters {
    fn default() -> Self {
        Self { size: 10.0, resolution: 128 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushParameters {
    /// Radius in heightmap pixels.
    pub radius: f32,
    pub strength: f32,
    pub erase: bool,
    /// World-space height of a fully painted texel.
    pub paint_height: f32,
}

impl Default for BrushParameters {
    fn default() -> Self {
        Self { radius: 24.0, strength: 0.05, erase: false, paint_height: 2.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderMode {
    CpuMesh,
    #[default]
    GpuShaded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParameters {
    pub mode: RenderMode,
    pub color: [f32; 3],
    pub cadence: FrameCadence,
}

impl Default for RenderParameters {
    fn default() -> Self {
        Self { mode: RenderMode::GpuShaded, color: [0.32, 0.55, 0.25], cadence: FrameCadence::VSync }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub noise: NoiseParameters,
    pub grid: GridParameters,
    pub brush: BrushParameters,
    pub render: RenderParameters,
}

impl TerrainParams {
    pub fn from_ron_str(s: &str) -> Result<Self, TerrainError> {
        ron::from_str(s).map_err(|e| TerrainError::Config(e.to_string()))
    }
}

/// Which consumers care about a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamGroup {
    Noise,
    Grid,
    Brush,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Amplitude,
    Persistence,
    Octaves,
    Lacunarity,
    Scale,
    Seed,
    OffsetX,
    OffsetY,
    CoupledFrequency,
    Size,
    Resolution,
    BrushRadius,
    BrushStrength,
    BrushErase,
    PaintHeight,
    GpuShaded,
    Color,
    FixedCadence,
}

impl ParamKey {
    pub const ALL: [ParamKey; 18] = [
        ParamKey::Amplitude,
        ParamKey::Persistence,
        ParamKey::Octaves,
        ParamKey::Lacunarity,
        ParamKey::Scale,
        ParamKey::Seed,
        ParamKey::OffsetX,
        ParamKey::OffsetY,
        ParamKey::CoupledFrequency,
        ParamKey::Size,
        ParamKey::Resolution,
        ParamKey::BrushRadius,
        ParamKey::BrushStrength,
        ParamKey::BrushErase,
        ParamKey::PaintHeight,
        ParamKey::GpuShaded,
        ParamKey::Color,
        ParamKey::FixedCadence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParamKey::Amplitude => "amplitude",
            ParamKey::Persistence => "persistence",
            ParamKey::Octaves => "octaves",
            ParamKey::Lacunarity => "lacunarity",
            ParamKey::Scale => "scale",
            ParamKey::Seed => "seed",
            ParamKey::OffsetX => "offset_x",
            ParamKey::OffsetY => "offset_y",
            ParamKey::CoupledFrequency => "coupled_frequency",
            ParamKey::Size => "size",
            ParamKey::Resolution => "resolution",
            ParamKey::BrushRadius => "brush_radius",
            ParamKey::BrushStrength => "brush_strength",
            ParamKey::BrushErase => "brush_erase",
            ParamKey::PaintHeight => "paint_height",
            ParamKey::GpuShaded => "gpu_shaded",
            ParamKey::Color => "color",
            ParamKey::FixedCadence => "fixed_cadence",
        }
    }

    pub fn group(self) -> ParamGroup {
        match self {
            ParamKey::Amplitude
            | ParamKey::Persistence
            | ParamKey::Octaves
            | ParamKey::Lacunarity
            | ParamKey::Scale
            | ParamKey::Seed
            | ParamKey::OffsetX
            | ParamKey::OffsetY
            | ParamKey::CoupledFrequency => ParamGroup::Noise,
            ParamKey::Size | ParamKey::Resolution => ParamGroup::Grid,
            ParamKey::BrushRadius | ParamKey::BrushStrength | ParamKey::BrushErase | ParamKey::PaintHeight => {
                ParamGroup::Brush
            }
            ParamKey::GpuShaded | ParamKey::Color | ParamKey::FixedCadence => ParamGroup::Render,
        }
    }

    /// Declared (min, max) for numeric keys; the panel uses the same bounds.
    pub fn range(self) -> Option<(f64, f64)> {
        match self {
            ParamKey::Amplitude => Some((0.01, 50.0)),
            ParamKey::Persistence => Some((MIN_PERSISTENCE as f64, 1.0)),
            ParamKey::Octaves => Some((0.0, MAX_OCTAVES as f64)),
            ParamKey::Lacunarity => Some((1.0, 4.0)),
            ParamKey::Scale => Some((0.001, 10.0)),
            ParamKey::Seed => Some((0.0, u32::MAX as f64)),
            ParamKey::OffsetX | ParamKey::OffsetY => Some((-10_000.0, 10_000.0)),
            ParamKey::Size => Some((0.1, 1000.0)),
            ParamKey::Resolution => Some((1.0, MAX_RESOLUTION as f64)),
            ParamKey::BrushRadius => Some((1.0, 128.0)),
            ParamKey::BrushStrength => Some((0.001, 1.0)),
            ParamKey::PaintHeight => Some((0.0, 20.0)),
            ParamKey::CoupledFrequency
            | ParamKey::BrushErase
            | ParamKey::GpuShaded
            | ParamKey::Color
            | ParamKey::FixedCadence => None,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, ParamKey::Octaves | ParamKey::Seed | ParamKey::Resolution)
    }
}

fn clamp_or(value: f32, key: ParamKey, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    match key.range() {
        Some((min, max)) => value.clamp(min as f32, max as f32),
        None => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Number(f64),
    Bool(bool),
    Color([f32; 3]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub key: ParamKey,
    pub value: ParamValue,
}

/// The single owner of the live configuration. All mutation goes through [`ParameterStore::set`].
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    params: TerrainParams,
    revision: u64,
}

impl ParameterStore {
    pub fn new(params: TerrainParams) -> Self {
        let mut params = params;
        params.noise = params.noise.sanitized();
        params.grid.size = clamp_or(params.grid.size, ParamKey::Size, GridParameters::default().size);
        params.grid.resolution = params.grid.resolution.clamp(1, MAX_RESOLUTION);
        let brush = BrushParameters::default();
        params.brush.radius = clamp_or(params.brush.radius, ParamKey::BrushRadius, brush.radius);
        params.brush.strength = clamp_or(params.brush.strength, ParamKey::BrushStrength, brush.strength);
        params.brush.paint_height = clamp_or(params.brush.paint_height, ParamKey::PaintHeight, brush.paint_height);
        params.render.color = clamp_color(params.render.color);
        params.render.cadence = params.render.cadence.sanitized();
        Self { params, revision: 0 }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Bumped on every effective change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn get(&self, key: ParamKey) -> ParamValue {
        let p = &self.params;
        match key {
            ParamKey::Amplitude => ParamValue::Number(p.noise.amplitude as f64),
            ParamKey::Persistence => ParamValue::Number(p.noise.persistence as f64),
            ParamKey::Octaves => ParamValue::Number(p.noise.octaves as f64),
            ParamKey::Lacunarity => ParamValue::Number(p.noise.lacunarity as f64),
            ParamKey::Scale => ParamValue::Number(p.noise.scale as f64),
            ParamKey::Seed => ParamValue::Number(p.noise.seed as f64),
            ParamKey::OffsetX => ParamValue::Number(p.noise.offset_x as f64),
            ParamKey::OffsetY => ParamValue::Number(p.noise.offset_y as f64),
            ParamKey::CoupledFrequency => ParamValue::Bool(p.noise.mode == FractalMode::Coupled),
            ParamKey::Size => ParamValue::Number(p.grid.size as f64),
            ParamKey::Resolution => ParamValue::Number(p.grid.resolution as f64),
            ParamKey::BrushRadius => ParamValue::Number(p.brush.radius as f64),
            ParamKey::BrushStrength => ParamValue::Number(p.brush.strength as f64),
            ParamKey::BrushErase => ParamValue::Bool(p.brush.erase),
            ParamKey::PaintHeight => ParamValue::Number(p.brush.paint_height as f64),
            ParamKey::GpuShaded => ParamValue::Bool(p.render.mode == RenderMode::GpuShaded),
            ParamKey::Color => ParamValue::Color(p.render.color),
            ParamKey::FixedCadence => ParamValue::Bool(matches!(p.render.cadence, FrameCadence::FixedInterval { .. })),
        }
    }

    /// Write one value. Numbers are clamped to the key's range; a wrong value kind or NaN is rejected.
    /// Returns `None` when the stored value did not change.
    pub fn set(&mut self, key: ParamKey, value: ParamValue) -> Result<Option<ParamChange>, TerrainError> {
        let mut next = self.params.clone();
        let p = &mut next;
        match (key, value) {
            (ParamKey::Amplitude, ParamValue::Number(n)) => p.noise.amplitude = checked_number(key, n)? as f32,
            (ParamKey::Persistence, ParamValue::Number(n)) => p.noise.persistence = checked_number(key, n)? as f32,
            (ParamKey::Octaves, ParamValue::Number(n)) => p.noise.octaves = checked_number(key, n)? as u32,
            (ParamKey::Lacunarity, ParamValue::Number(n)) => p.noise.lacunarity = checked_number(key, n)? as f32,
            (ParamKey::Scale, ParamValue::Number(n)) => p.noise.scale = checked_number(key, n)? as f32,
            (ParamKey::Seed, ParamValue::Number(n)) => p.noise.seed = checked_number(key, n)? as u32,
            (ParamKey::OffsetX, ParamValue::Number(n)) => p.noise.offset_x = checked_number(key, n)? as f32,
            (ParamKey::OffsetY, ParamValue::Number(n)) => p.noise.offset_y = checked_number(key, n)? as f32,
            (ParamKey::CoupledFrequency, ParamValue::Bool(b)) => {
                p.noise.mode = if b { FractalMode::Coupled } else { FractalMode::Independent }
            }
            (ParamKey::Size, ParamValue::Number(n)) => p.grid.size = checked_number(key, n)? as f32,
            (ParamKey::Resolution, ParamValue::Number(n)) => p.grid.resolution = checked_number(key, n)? as u32,
            (ParamKey::BrushRadius, ParamValue::Number(n)) => p.brush.radius = checked_number(key, n)? as f32,
            (ParamKey::BrushStrength, ParamValue::Number(n)) => p.brush.strength = checked_number(key, n)? as f32,
            (ParamKey::BrushErase, ParamValue::Bool(b)) => p.brush.erase = b,
            (ParamKey::PaintHeight, ParamValue::Number(n)) => p.brush.paint_height = checked_number(key, n)? as f32,
            (ParamKey::GpuShaded, ParamValue::Bool(b)) => {
                p.render.mode = if b { RenderMode::GpuShaded } else { RenderMode::CpuMesh }
            }
            (ParamKey::Color, ParamValue::Color(c)) => p.render.color = clamp_color(c),
            // 已是定频时保留原频率
            (ParamKey::FixedCadence, ParamValue::Bool(b)) => {
                p.render.cadence = match (b, p.render.cadence) {
                    (false, _) => FrameCadence::VSync,
                    (true, FrameCadence::VSync) => FrameCadence::default_fixed(),
                    (true, fixed) => fixed,
                }
            }
            (key, other) => return Err(TerrainError::invalid(key.name(), format!("{other:?}"), "wrong value kind")),
        }

        if next == self.params {
            return Ok(None);
        }
        self.params = next;
        self.revision += 1;
        Ok(Some(ParamChange { key, value: self.get(key) }))
    }
}

/// NaN is rejected; everything else is clamped to the key's range and rounded for integer keys.
fn checked_number(key: ParamKey, n: f64) -> Result<f64, TerrainError> {
    if n.is_nan() {
        return Err(TerrainError::invalid(key.name(), n, "not a number"));
    }
    let Some((min, max)) = key.range() else {
        return Ok(n);
    };
    let clamped = n.clamp(min, max);
    if clamped != n {
        log::debug!("clamped {} from {} to {}", key.name(), n, clamped);
    }
    Ok(if key.is_integer() { clamped.round() } else { clamped })
}

fn clamp_color(c: [f32; 3]) -> [f32; 3] {
    c.map(|x| if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_declared_range() {
        let mut store = ParameterStore::default();
        let change = store.set(ParamKey::Persistence, ParamValue::Number(0.0)).unwrap().unwrap();
        assert_eq!(change.value, ParamValue::Number(MIN_PERSISTENCE as f64));
        assert_eq!(store.params().noise.persistence, MIN_PERSISTENCE);

        store.set(ParamKey::Resolution, ParamValue::Number(0.0)).unwrap();
        assert_eq!(store.params().grid.resolution, 1);
        store.set(ParamKey::Octaves, ParamValue::Number(3.6)).unwrap();
        assert_eq!(store.params().noise.octaves, 4);
    }

    #[test]
    fn set_rejects_wrong_kind_and_nan() {
        let mut store = ParameterStore::default();
        assert!(matches!(
            store.set(ParamKey::Amplitude, ParamValue::Bool(true)),
            Err(TerrainError::InvalidParameter { name: "amplitude", .. })
        ));
        assert!(store.set(ParamKey::Scale, ParamValue::Number(f64::NAN)).is_err());
        assert!(store.set(ParamKey::BrushErase, ParamValue::Color([1.0; 3])).is_err());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn unchanged_value_reports_no_change() {
        let mut store = ParameterStore::default();
        let amp = store.params().noise.amplitude as f64;
        assert_eq!(store.set(ParamKey::Amplitude, ParamValue::Number(amp)).unwrap(), None);
        assert!(store.set(ParamKey::BrushErase, ParamValue::Bool(true)).unwrap().is_some());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn toggles_map_onto_enums() {
        let mut store = ParameterStore::default();
        store.set(ParamKey::CoupledFrequency, ParamValue::Bool(true)).unwrap();
        store.set(ParamKey::GpuShaded, ParamValue::Bool(false)).unwrap();
        store.set(ParamKey::FixedCadence, ParamValue::Bool(true)).unwrap();
        let p = store.params();
        assert_eq!(p.noise.mode, FractalMode::Coupled);
        assert_eq!(p.render.mode, RenderMode::CpuMesh);
        assert_eq!(p.render.cadence, FrameCadence::FixedInterval { hz: 30.0 });
    }

    #[test]
    fn every_key_round_trips_through_get() {
        let store = ParameterStore::default();
        for key in ParamKey::ALL {
            let mut copy = store.clone();
            assert_eq!(copy.set(key, store.get(key)).unwrap(), None, "{}", key.name());
        }
    }

    #[test]
    fn validate_rejects_zero_persistence_and_sanitize_floors_it() {
        let params = NoiseParameters { persistence: 0.0, ..Default::default() };
        assert!(matches!(params.validate(), Err(TerrainError::InvalidParameter { name: "persistence", .. })));
        assert_eq!(params.sanitized().persistence, MIN_PERSISTENCE);
        assert!(params.sanitized().validate().is_ok());
    }

    #[test]
    fn store_sanitizes_loaded_brush_and_render() {
        let params = TerrainParams::from_ron_str(
            "(render: (cadence: FixedInterval(hz: 1e10), color: (2.0, -1.0, 0.5)), brush: (radius: 0.0, strength: 5.0))",
        )
        .unwrap();
        let store = ParameterStore::new(params);
        let p = store.params();
        assert_eq!(p.render.cadence, FrameCadence::FixedInterval { hz: FrameCadence::MAX_FIXED_HZ });
        assert_eq!(p.render.color, [1.0, 0.0, 0.5]);
        assert_eq!(p.brush.radius, 1.0);
        assert_eq!(p.brush.strength, 1.0);

        let tiny = TerrainParams::from_ron_str("(render: (cadence: FixedInterval(hz: 1e-30)))").unwrap();
        assert_eq!(
            ParameterStore::new(tiny).params().render.cadence,
            FrameCadence::FixedInterval { hz: FrameCadence::MIN_FIXED_HZ }
        );
    }

    #[test]
    fn fixed_cadence_toggle_keeps_a_configured_rate() {
        let params = TerrainParams::from_ron_str("(render: (cadence: FixedInterval(hz: 60.0)))").unwrap();
        let mut store = ParameterStore::new(params);
        assert_eq!(store.set(ParamKey::FixedCadence, ParamValue::Bool(true)).unwrap(), None);
        assert_eq!(store.params().render.cadence, FrameCadence::FixedInterval { hz: 60.0 });
        store.set(ParamKey::FixedCadence, ParamValue::Bool(false)).unwrap();
        assert_eq!(store.params().render.cadence, FrameCadence::VSync);
    }

    #[test]
    fn every_key_rejects_every_foreign_value_kind() {
        let kinds = [ParamValue::Number(1.0), ParamValue::Bool(true), ParamValue::Color([0.5; 3])];
        for key in ParamKey::ALL {
            let mut store = ParameterStore::default();
            let own = std::mem::discriminant(&store.get(key));
            for value in kinds {
                let result = store.set(key, value);
                if std::mem::discriminant(&value) == own {
                    assert!(result.is_ok(), "{}", key.name());
                } else {
                    assert!(result.is_err(), "{} accepted {value:?}", key.name());
                }
            }
        }
    }

    #[test]
    fn groups_route_changes() {
        assert_eq!(ParamKey::Seed.group(), ParamGroup::Noise);
        assert_eq!(ParamKey::Resolution.group(), ParamGroup::Grid);
        assert_eq!(ParamKey::BrushErase.group(), ParamGroup::Brush);
        assert_eq!(ParamKey::Color.group(), ParamGroup::Render);
    }

    #[test]
    fn params_parse_from_partial_ron() {
        let params = TerrainParams::from_ron_str("(noise: (octaves: 3, seed: 7), grid: (resolution: 16))").unwrap();
        assert_eq!(params.noise.octaves, 3);
        assert_eq!(params.noise.seed, 7);
        assert_eq!(params.noise.amplitude, NoiseParameters::default().amplitude);
        assert_eq!(params.grid.resolution, 16);
        assert!(TerrainParams::from_ron_str("(noise: 3)").is_err());
    }
}
