// animfit/src/pipeline/approval.rs
use super::{Artifact, Stage, StageContext, StageOutcome};
use crate::core::{ImageMetadata, OptimizationResult, PipelineState, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The artifact already fits; the gate has nothing to decide.
    WithinBudget,
    Proceed,
    ApprovalRequired {
        estimated_frame_reduction_percent: u32,
        current_size_bytes: u64,
        target_size_bytes: u64,
    },
}

/// `ceil((1 - target / current) * 100)`, computed in integers.
pub fn estimate_frame_reduction_percent(current_size_bytes: u64, target_size_bytes: u64) -> u32 {
    if current_size_bytes == 0 || current_size_bytes <= target_size_bytes {
        return 0;
    }
    let excess = u128::from(current_size_bytes - target_size_bytes) * 100;
    let current = u128::from(current_size_bytes);
    ((excess + current - 1) / current) as u32
}

/// Decides whether destructive frame reduction may run. Pure: it never
/// touches the asset.
pub struct ApprovalGate;

impl ApprovalGate {
    pub fn decide(metadata: &ImageMetadata, max_size_bytes: u64, allow_frame_reduction: bool) -> GateDecision {
        if metadata.size_bytes <= max_size_bytes {
            return GateDecision::WithinBudget;
        }

        if allow_frame_reduction {
            return GateDecision::Proceed;
        }

        GateDecision::ApprovalRequired {
            estimated_frame_reduction_percent: estimate_frame_reduction_percent(
                metadata.size_bytes,
                max_size_bytes,
            ),
            current_size_bytes: metadata.size_bytes,
            target_size_bytes: max_size_bytes,
        }
    }
}

impl Stage for ApprovalGate {
    fn name(&self) -> &'static str {
        "approval-gate"
    }

    fn entry_state(&self) -> Option<PipelineState> {
        Some(PipelineState::ApprovalPending)
    }

    fn exit_state(&self) -> PipelineState {
        PipelineState::FrameReducing
    }

    fn attempt(&self, ctx: &mut StageContext<'_>, input: Artifact) -> Result<StageOutcome> {
        let decision = Self::decide(
            &input.metadata,
            ctx.budget(),
            ctx.request.allow_frame_reduction,
        );

        match decision {
            GateDecision::WithinBudget => Ok(StageOutcome::Complete(input)),
            GateDecision::Proceed => {
                log::info!("Frame reduction pre-approved, proceeding");
                Ok(StageOutcome::Continue(input))
            }
            GateDecision::ApprovalRequired {
                estimated_frame_reduction_percent,
                current_size_bytes,
                target_size_bytes,
            } => {
                log::warn!(
                    "Budget needs frame reduction (~{}% of frames); approval required",
                    estimated_frame_reduction_percent
                );
                // The non-conforming artifact must not outlive this run.
                ctx.scratch.discard(&input.path);
                Ok(StageOutcome::Halt(OptimizationResult::ApprovalRequired {
                    estimated_frame_reduction_percent,
                    current_size_bytes,
                    target_size_bytes,
                }))
            }
        }
    }
}
