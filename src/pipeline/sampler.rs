// animfit/src/pipeline/sampler.rs
use super::{Artifact, Stage, StageContext, StageOutcome};
use crate::core::{FailureReason, OptimizationResult, OptimizeError, PipelineState, Result};

pub const DEFAULT_KEEP_PERCENT: u32 = 85;

/// Frame indices kept by one sampling pass, or `None` when the pass could
/// not lower the frame count.
///
/// Aims for `floor(n * keep_percent / 100)` frames and takes every
/// `ceil(n / keep)`-th frame starting at 0, so the selection is
/// deterministic and keeps playback order.
pub fn sampling_indices(frame_count: u32, keep_percent: u32) -> Option<Vec<usize>> {
    let n = frame_count as usize;
    let keep = n * keep_percent as usize / 100;
    if keep == 0 || keep >= n {
        return None;
    }

    let step = (n + keep - 1) / keep;
    Some((0..n).step_by(step).collect())
}

/// Drops frames pass by pass until the budget is met or one frame is left.
pub struct FrameSampler {
    keep_percent: u32,
}

impl FrameSampler {
    pub fn new(keep_percent: u32) -> Self {
        Self {
            keep_percent: keep_percent.clamp(1, 99),
        }
    }

    fn unreachable(artifact: &Artifact, best_size: u64) -> StageOutcome {
        StageOutcome::Halt(OptimizationResult::Failed {
            reason: FailureReason::BudgetUnreachable,
            best_achieved_size_bytes: best_size,
            frame_count: artifact.metadata.frame_count,
        })
    }
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_KEEP_PERCENT)
    }
}

impl Stage for FrameSampler {
    fn name(&self) -> &'static str {
        "frame-sampler"
    }

    fn exit_state(&self) -> PipelineState {
        PipelineState::FrameReducing
    }

    fn attempt(&self, ctx: &mut StageContext<'_>, input: Artifact) -> Result<StageOutcome> {
        let budget = ctx.budget();

        if input.metadata.size_bytes <= budget {
            return Ok(StageOutcome::Complete(input));
        }

        if input.metadata.frame_count <= 2 {
            log::warn!(
                "Only {} frame(s); dropping frames cannot reach {} bytes",
                input.metadata.frame_count,
                budget
            );
            let best = input.metadata.size_bytes;
            return Ok(Self::unreachable(&input, best));
        }

        let mut current = input;
        let mut best_size = current.metadata.size_bytes;

        while current.metadata.size_bytes > budget && current.metadata.frame_count > 1 {
            ctx.cancel.check()?;

            let indices = match sampling_indices(current.metadata.frame_count, self.keep_percent) {
                Some(indices) => indices,
                None => break,
            };

            let src = current.path.clone();
            let label = format!("frames-{}", indices.len());
            let next = ctx.derive(&label, |ops, dst| ops.sample_frames(&src, dst, &indices))?;

            if next.metadata.frame_count as usize != indices.len() {
                return Err(OptimizeError::Processing(format!(
                    "Sampling kept {} frames, expected {}",
                    next.metadata.frame_count,
                    indices.len()
                )));
            }

            log::info!(
                "Sampled {} -> {} frames: {} bytes (budget {})",
                current.metadata.frame_count,
                next.metadata.frame_count,
                next.metadata.size_bytes,
                budget
            );

            ctx.scratch.discard(&current.path);
            best_size = best_size.min(next.metadata.size_bytes);
            current = next;
        }

        if current.metadata.size_bytes <= budget {
            return Ok(StageOutcome::Complete(current));
        }

        log::warn!(
            "Budget of {} bytes unreachable; best was {} bytes at {} frame(s)",
            budget,
            best_size,
            current.metadata.frame_count
        );
        ctx.scratch.discard(&current.path);
        Ok(Self::unreachable(&current, best_size))
    }
}
