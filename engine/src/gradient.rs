//! Seeded hash-gradient noise, the 2D primitive under the fractal sum.
//!
//! `shaders/noise_height.wgsl` carries the same integer hash, fade curve and scaling, so a
//! GPU-rendered heightmap and a CPU-displaced mesh show the same terrain for the same seed.

use std::f32::consts::{SQRT_2, TAU};

use noise::{NoiseFn, Seedable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashGradient {
    seed: u32,
}

impl HashGradient {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    /// Unit gradient of a lattice cell.
    fn gradient(&self, cx: i32, cz: i32) -> [f32; 2] {
        let mut h = (cx as u32).wrapping_mul(0x8da6_b343)
            ^ (cz as u32).wrapping_mul(0xd816_3841)
            ^ self.seed.wrapping_mul(0xcb1a_b31f);
        h = (h ^ (h >> 16)).wrapping_mul(0x7feb_352d);
        h = (h ^ (h >> 15)).wrapping_mul(0x846c_a68b);
        h ^= h >> 16;
        let angle = h as f32 * (TAU / 4_294_967_296.0);
        [angle.cos(), angle.sin()]
    }

    /// Roughly in [-1, 1]; zero on every lattice point.
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let (ix, iz) = (x.floor(), z.floor());
        let (fx, fz) = (x - ix, z - iz);
        let (cx, cz) = (ix as i32, iz as i32);
        let dot = |ox: i32, oz: i32| {
            let g = self.gradient(cx.wrapping_add(ox), cz.wrapping_add(oz));
            g[0] * (fx - ox as f32) + g[1] * (fz - oz as f32)
        };
        let (ux, uz) = (fade(fx), fade(fz));
        let bottom = lerp(dot(0, 0), dot(1, 0), ux);
        let top = lerp(dot(0, 1), dot(1, 1), ux);
        lerp(bottom, top, uz) * SQRT_2
    }
}

fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

// WGSL mix(a, b, t)
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

impl NoiseFn<f64, 2> for HashGradient {
    fn get(&self, point: [f64; 2]) -> f64 {
        self.sample(point[0] as f32, point[1] as f32) as f64
    }
}

impl Seedable for HashGradient {
    fn set_seed(self, seed: u32) -> Self {
        Self { seed }
    }

    fn seed(&self) -> u32 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_values() {
        let cases = [
            (0.5, 0.5, 42, 0.369474),
            (1.25, -3.75, 42, 0.542618),
            (-7.3, 2.1, 7, 0.023403),
            (10.6, 0.2, 0, 0.222521),
            (0.5, 0.5, 43, -0.097703),
        ];
        for (x, z, seed, expected) in cases {
            let v = HashGradient::new(seed).sample(x, z);
            assert!((v - expected).abs() < 1e-4, "({x}, {z}) seed {seed}: {v}");
        }
    }

    #[test]
    fn lattice_points_are_zero() {
        let g = HashGradient::new(9);
        for (x, z) in [(0.0, 0.0), (3.0, -2.0), (-17.0, 40.0)] {
            assert_eq!(g.sample(x, z), 0.0);
        }
    }

    #[test]
    fn output_stays_bounded() {
        let g = HashGradient::new(1234);
        for i in 0..2_000 {
            let (x, z) = (i as f32 * 0.173 - 150.0, i as f32 * -0.291 + 60.0);
            assert!(g.sample(x, z).abs() <= 1.0);
        }
    }

    #[test]
    fn noise_fn_and_seedable_agree_with_sample() {
        let g = HashGradient::default().set_seed(5);
        assert_eq!(g.seed(), 5);
        assert_eq!(g.get([2.5, -1.25]), g.sample(2.5, -1.25) as f64);
    }
}
