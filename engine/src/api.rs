use thiserror::Error;

use crate::graph::{FrameContext, PassDesc};
use crate::target::{TargetDesc, TargetId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TerrainError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter { name: &'static str, value: String, reason: &'static str },
    #[error("readback from `{target}` before it was ever rendered")]
    StaleReadback { target: &'static str },
    #[error("target `{target}` is {expected:?} but data is sized for {actual:?}")]
    ResizeInconsistency { target: &'static str, expected: (u32, u32), actual: (u32, u32) },
    #[error("read of {w}x{h} at ({x}, {y}) is outside target `{target}`")]
    ReadOutOfBounds { target: &'static str, x: u32, y: u32, w: u32, h: u32 },
    #[error("unknown render target `{0}`")]
    UnknownTarget(&'static str),
    #[error("unknown pass `{0}`")]
    UnknownPass(String),
    #[error("target `{target}` is written by both `{first}` and `{second}`")]
    DuplicateWriter { target: &'static str, first: &'static str, second: &'static str },
    #[error("pass dependency cycle through `{0}`")]
    GraphCycle(&'static str),
    #[error("the last pass must draw to the screen (last is `{0}`)")]
    ScreenNotLast(&'static str),
    #[error("graph has not been compiled")]
    NotCompiled,
    #[error("configuration error: {0}")]
    Config(String),
}

impl TerrainError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: &'static str) -> Self {
        TerrainError::InvalidParameter { name, value: value.to_string(), reason }
    }
}

/// Anything that can answer "how high is the ground at (x, z)".
pub trait HeightSource {
    fn height_at(&self, x: f32, z: f32) -> f32;
}

impl<F: Fn(f32, f32) -> f32> HeightSource for F {
    fn height_at(&self, x: f32, z: f32) -> f32 { self(x, z) }
}

/// Offscreen target provider: render-to-texture allocation plus pixel readback.
pub trait TargetProvider {
    fn create_target(&mut self, desc: &TargetDesc, width: u32, height: u32) -> Result<(), TerrainError>;
    fn resize(&mut self, target: TargetId, width: u32, height: u32) -> Result<(), TerrainError>;
    fn read_pixels(&self, target: TargetId, x: u32, y: u32, w: u32, h: u32) -> Result<Vec<u8>, TerrainError>;
    fn target_size(&self, target: TargetId) -> Option<(u32, u32)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass drew into its output this tick.
    Rendered,
    /// Nothing to do this tick; the output keeps its previous contents.
    Skipped,
}

pub trait PassExecutor {
    fn execute(&mut self, pass: &PassDesc, frame: &FrameContext) -> Result<PassOutcome, TerrainError>;
}
