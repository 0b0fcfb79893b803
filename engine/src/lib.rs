pub mod api;
pub mod cadence;
pub mod gradient;
pub mod graph;
pub mod grid;
pub mod paint;
pub mod params;
pub mod pipeline;
pub mod sampling;
pub mod target;

pub use api::{HeightSource, PassExecutor, PassOutcome, TargetProvider, TerrainError};
pub use cadence::{FrameCadence, TickScheduler};
pub use gradient::HashGradient;
pub use graph::{FrameContext, FrameReport, PassBuilder, PassDesc, PassOutput, RenderGraph};
pub use grid::{build_displaced_grid, build_grid, DisplacedGrid, IndexedGrid};
pub use paint::{BlendMode, Brush, BrushShape, BrushStamp, BrushStroke, BrushTexture, HeightLayer, PaintController, PaintState, PointerEvent};
pub use params::{
    BrushParameters, FractalMode, GridParameters, NoiseParameters, ParamChange, ParamGroup, ParamKey, ParamValue,
    ParameterStore, RenderMode, RenderParameters, TerrainParams,
};
pub use sampling::{evaluate_height, HeightSample, NoiseEvaluator};
pub use target::{HostTargets, RenderTarget, TargetDesc, TargetFormat, TargetId, TargetSizing};
