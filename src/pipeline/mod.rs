// animfit/src/pipeline/mod.rs
//! The staged optimization pipeline.
//!
//! After the asset is probed, the orchestrator feeds it through an ordered
//! list of [`Stage`]s. Each stage either hands a (possibly new) artifact to
//! the next one, completes the run because the budget is met, or halts it
//! with a final [`OptimizationResult`].

mod approval;
mod normalize;
mod probe;
mod reduce;
mod sampler;
mod scratch;

pub use approval::{estimate_frame_reduction_percent, ApprovalGate, GateDecision};
pub use normalize::{plan_dimensions, DimensionNormalizer, DimensionPlan};
pub use probe::MetadataProbe;
pub use reduce::SizeReducer;
pub use sampler::{sampling_indices, FrameSampler};
pub use scratch::Scratch;

use crate::core::{
    CancelToken, ImageMetadata, OptimizationRequest, OptimizationResult, PipelineState, Result,
};
use crate::processors::ImageOps;
use std::path::PathBuf;

/// An asset on disk together with its freshly probed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub metadata: ImageMetadata,
}

#[derive(Debug)]
pub enum StageOutcome {
    /// Hand the artifact to the next stage.
    Continue(Artifact),
    /// The artifact satisfies every constraint.
    Complete(Artifact),
    /// Stop with a non-success result.
    Halt(OptimizationResult),
}

pub struct StageContext<'a> {
    pub ops: &'a dyn ImageOps,
    pub request: &'a OptimizationRequest,
    pub scratch: &'a mut Scratch,
    pub cancel: &'a CancelToken,
}

impl StageContext<'_> {
    pub fn budget(&self) -> u64 {
        self.request.max_size_bytes
    }

    /// Runs `transform` into a fresh scratch path and probes the result.
    pub fn derive<F>(&mut self, label: &str, transform: F) -> Result<Artifact>
    where
        F: FnOnce(&dyn ImageOps, &std::path::Path) -> Result<()>,
    {
        let path = self.scratch.allocate(label);
        transform(self.ops, &path)?;
        let metadata = MetadataProbe::probe_intermediate(self.ops, &path)?;
        Ok(Artifact { path, metadata })
    }
}

pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// State held while the stage is deciding, if it differs from the
    /// previous stage's exit state.
    fn entry_state(&self) -> Option<PipelineState> {
        None
    }

    /// State reached when the stage continues with an artifact.
    fn exit_state(&self) -> PipelineState;

    fn attempt(&self, ctx: &mut StageContext<'_>, input: Artifact) -> Result<StageOutcome>;
}

/// The stage order every run follows.
pub fn default_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(DimensionNormalizer),
        Box::new(SizeReducer::default()),
        Box::new(ApprovalGate),
        Box::new(FrameSampler::default()),
    ]
}

/// Only the frame sampler may change the frame count.
pub(crate) fn ensure_frame_count(stage: &str, before: &Artifact, after: &Artifact) -> Result<()> {
    if before.metadata.frame_count != after.metadata.frame_count {
        return Err(crate::core::OptimizeError::Processing(format!(
            "{} changed the frame count from {} to {}",
            stage, before.metadata.frame_count, after.metadata.frame_count
        )));
    }
    Ok(())
}
