pub mod cli;
mod core;
mod pipeline;
mod processors;
mod utils;

pub use crate::core::{
    CancelToken, Color, DimensionBounds, FailureReason, ImageMetadata, Mode, OptimizationReport,
    OptimizationRequest, OptimizationResult, OptimizeError, OptimizeParams, OptimizeResponse,
    Optimizer, OptimizerConfig, PipelineState, ResizeAlgorithm, Result, DEFAULT_MIN_DIMENSION,
    PALETTE_LADDER,
};
pub use crate::core::params::{ApprovalBody, SuccessBody};
pub use crate::pipeline::{
    default_stages, estimate_frame_reduction_percent, plan_dimensions, sampling_indices,
    ApprovalGate, Artifact, DimensionNormalizer, DimensionPlan, FrameSampler, GateDecision,
    MetadataProbe, Scratch, SizeReducer, Stage, StageContext, StageOutcome,
};
pub use crate::processors::{
    BatchProcessor, BatchStats, Compressor, GifOps, ImageOps, Loader, Resizer,
    DEFAULT_MEMORY_BUDGET_MB,
};
pub use crate::utils::{
    calculate_aspect_ratio, format_file_size, generate_output_path, is_supported_format,
    percent_saved,
};

pub mod prelude {
    pub use crate::{
        BatchProcessor, CancelToken, GifOps, ImageOps, OptimizationRequest, OptimizationResult,
        OptimizeParams, Optimizer, OptimizerConfig,
    };
}
