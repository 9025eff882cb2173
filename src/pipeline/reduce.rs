// animfit/src/pipeline/reduce.rs
use super::{ensure_frame_count, Artifact, Stage, StageContext, StageOutcome};
use crate::core::{PipelineState, Result, PALETTE_LADDER};

/// Walks the palette ladder until the budget is met.
///
/// Every level re-encodes the stage's input (not the previous level's
/// output) and the first level that fits wins. When no level fits, the
/// smallest-palette result is handed on as the baseline for the approval
/// estimate. Only `recolor` is ever called here, so frames are untouched.
pub struct SizeReducer {
    ladder: Vec<u16>,
}

impl SizeReducer {
    pub fn new(ladder: Vec<u16>) -> Self {
        Self { ladder }
    }

    pub fn ladder(&self) -> &[u16] {
        &self.ladder
    }
}

impl Default for SizeReducer {
    fn default() -> Self {
        Self::new(PALETTE_LADDER.to_vec())
    }
}

impl Stage for SizeReducer {
    fn name(&self) -> &'static str {
        "size-reducer"
    }

    fn exit_state(&self) -> PipelineState {
        PipelineState::SizeReduced
    }

    fn attempt(&self, ctx: &mut StageContext<'_>, input: Artifact) -> Result<StageOutcome> {
        let budget = ctx.budget();

        if input.metadata.size_bytes <= budget {
            log::debug!(
                "{} bytes already within budget of {}, skipping palette ladder",
                input.metadata.size_bytes,
                budget
            );
            return Ok(StageOutcome::Complete(input));
        }

        let mut best: Option<Artifact> = None;

        for &colors in &self.ladder {
            ctx.cancel.check()?;

            let src = input.path.clone();
            let label = format!("recolor-{}", colors);
            let candidate = ctx.derive(&label, |ops, dst| ops.recolor(&src, dst, colors))?;
            ensure_frame_count(self.name(), &input, &candidate)?;

            log::info!(
                "Palette {} colors: {} bytes (budget {})",
                colors,
                candidate.metadata.size_bytes,
                budget
            );

            if let Some(previous) = best.take() {
                ctx.scratch.discard(&previous.path);
            }

            if candidate.metadata.size_bytes <= budget {
                ctx.scratch.discard(&input.path);
                return Ok(StageOutcome::Complete(candidate));
            }

            best = Some(candidate);
        }

        match best {
            Some(smallest) => {
                ctx.scratch.discard(&input.path);
                Ok(StageOutcome::Continue(smallest))
            }
            None => Ok(StageOutcome::Continue(input)),
        }
    }
}
