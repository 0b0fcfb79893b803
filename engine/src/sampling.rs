use crate::api::{HeightSource, TerrainError};
use crate::gradient::HashGradient;
use crate::params::{FractalMode, NoiseParameters};

/// Fractal Brownian motion over seeded gradient noise ([`HashGradient`]).
///
/// The first octave samples at frequency `scale`, so with one octave
/// `height_at(x, z) == amplitude * noise2d((x + offset_x) * scale, (z + offset_y) * scale)`.
#[derive(Clone)]
pub struct NoiseEvaluator {
    gradient: HashGradient,
    params: NoiseParameters,
}

impl NoiseEvaluator {
    pub fn new(params: &NoiseParameters) -> Result<Self, TerrainError> {
        params.validate()?;
        Ok(Self { gradient: HashGradient::new(params.seed), params: params.clone() })
    }

    pub fn params(&self) -> &NoiseParameters {
        &self.params
    }

    /// The single-octave primitive, roughly in [-1, 1].
    pub fn noise2d(&self, x: f32, z: f32) -> f32 {
        self.gradient.sample(x, z)
    }

    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let p = &self.params;
        let (x, z) = (x + p.offset_x, z + p.offset_y);
        let mut amp = p.amplitude;
        let mut freq = p.scale;
        let mut height = 0.0;
        for _ in 0..p.octaves {
            height += amp * self.noise2d(x * freq, z * freq);
            amp *= p.persistence;
            match p.mode {
                FractalMode::Independent => freq *= p.lacunarity,
                FractalMode::Coupled => freq /= p.persistence,
            }
        }
        height
    }

    /// Row-major `width x height` samples covering `origin .. origin + extent` (cell centers).
    pub fn sample_region(&self, origin: [f32; 2], extent: [f32; 2], width: u32, height: u32) -> HeightSample {
        let (width, height) = (width.max(1), height.max(1));
        let step = [extent[0] / width as f32, extent[1] / height as f32];
        let mut data = Vec::with_capacity((width * height) as usize);
        let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
        for row in 0..height {
            let z = origin[1] + (row as f32 + 0.5) * step[1];
            for col in 0..width {
                let x = origin[0] + (col as f32 + 0.5) * step[0];
                let h = self.height_at(x, z);
                min = min.min(h);
                max = max.max(h);
                data.push(h);
            }
        }
        HeightSample { width, height, data, min, max }
    }
}

impl HeightSource for NoiseEvaluator {
    fn height_at(&self, x: f32, z: f32) -> f32 {
        NoiseEvaluator::height_at(self, x, z)
    }
}

/// One-shot evaluation; validates `params` every call.
pub fn evaluate_height(x: f32, z: f32, params: &NoiseParameters) -> Result<f32, TerrainError> {
    Ok(NoiseEvaluator::new(params)?.height_at(x, z))
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeightSample {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    pub min: f32,
    pub max: f32,
}

impl HeightSample {
    /// Heights mapped to 0..=255 over the sample's own range.
    pub fn to_gray(&self) -> Vec<u8> {
        let span = (self.max - self.min).max(f32::EPSILON);
        self.data.iter().map(|h| (((h - self.min) / span).clamp(0.0, 1.0) * 255.0) as u8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> NoiseParameters {
        NoiseParameters::default()
    }

    const SAMPLES: [(f32, f32); 5] = [(0.3, 0.7), (-4.21, 9.5), (13.37, -2.2), (100.1, 55.55), (-0.05, -0.95)];

    #[test]
    fn evaluation_is_deterministic() {
        let p = params();
        for (x, z) in SAMPLES {
            let a = evaluate_height(x, z, &p).unwrap();
            let b = evaluate_height(x, z, &p).unwrap();
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn seed_changes_the_terrain() {
        let a = NoiseEvaluator::new(&NoiseParameters { seed: 1, ..params() }).unwrap();
        let b = NoiseEvaluator::new(&NoiseParameters { seed: 2, ..params() }).unwrap();
        assert!(SAMPLES.iter().any(|&(x, z)| a.height_at(x, z) != b.height_at(x, z)));
    }

    #[test]
    fn one_octave_is_a_single_scaled_sample() {
        let p = NoiseParameters { amplitude: 3.5, octaves: 1, scale: 0.37, ..params() };
        let eval = NoiseEvaluator::new(&p).unwrap();
        for (x, z) in SAMPLES {
            assert_eq!(eval.height_at(x, z), 3.5 * eval.noise2d(x * 0.37, z * 0.37));
        }
    }

    #[test]
    fn origin_example_uses_scale_as_base_frequency() {
        let p = NoiseParameters { amplitude: 1.0, persistence: 1.0, octaves: 1, seed: 42, ..params() };
        let eval = NoiseEvaluator::new(&p).unwrap();
        assert_eq!(evaluate_height(0.0, 0.0, &p).unwrap(), eval.noise2d(0.0, 0.0));
    }

    #[test]
    fn zero_octaves_is_flat() {
        let p = NoiseParameters { octaves: 0, ..params() };
        for (x, z) in SAMPLES {
            assert_eq!(evaluate_height(x, z, &p).unwrap(), 0.0);
        }
    }

    #[test]
    fn zero_persistence_is_rejected() {
        let p = NoiseParameters { persistence: 0.0, ..params() };
        assert!(matches!(evaluate_height(1.0, 1.0, &p), Err(TerrainError::InvalidParameter { name: "persistence", .. })));
    }

    #[test]
    fn coupled_mode_differs_from_independent() {
        let ind = NoiseEvaluator::new(&NoiseParameters { persistence: 0.4, lacunarity: 2.0, ..params() }).unwrap();
        let cpl = NoiseEvaluator::new(&NoiseParameters { persistence: 0.4, lacunarity: 2.0, mode: FractalMode::Coupled, ..params() })
            .unwrap();
        assert!(SAMPLES.iter().any(|&(x, z)| ind.height_at(x, z) != cpl.height_at(x, z)));

        // with lacunarity == 1/persistence both formulas agree
        let ind = NoiseEvaluator::new(&NoiseParameters { persistence: 0.5, lacunarity: 2.0, ..params() }).unwrap();
        let cpl = NoiseEvaluator::new(&NoiseParameters { persistence: 0.5, mode: FractalMode::Coupled, ..params() }).unwrap();
        for (x, z) in SAMPLES {
            assert_eq!(ind.height_at(x, z), cpl.height_at(x, z));
        }
    }

    #[test]
    fn offsets_pan_the_sample_space() {
        let base = NoiseEvaluator::new(&params()).unwrap();
        let panned = NoiseEvaluator::new(&NoiseParameters { offset_x: 3.0, offset_y: -2.0, ..params() }).unwrap();
        assert_eq!(panned.height_at(0.25, 0.5), base.height_at(3.25, -1.5));
    }

    #[test]
    fn sample_region_tracks_range() {
        let eval = NoiseEvaluator::new(&params()).unwrap();
        let s = eval.sample_region([-5.0, -5.0], [10.0, 10.0], 16, 8);
        assert_eq!(s.data.len(), 128);
        assert!(s.data.iter().all(|h| *h >= s.min && *h <= s.max));
        assert_eq!(s.data[0], eval.height_at(-5.0 + 0.3125, -5.0 + 0.625));
        let gray = s.to_gray();
        assert!(gray.contains(&0) && gray.contains(&255));
    }
}
