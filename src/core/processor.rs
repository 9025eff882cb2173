// animfit/src/core/processor.rs
use super::{
    CancelToken, FailureReason, ImageMetadata, OptimizationReport, OptimizationRequest,
    OptimizationResult, OptimizeError, PipelineState, ResizeAlgorithm, Result,
};
use crate::pipeline::{default_stages, Artifact, MetadataProbe, Scratch, Stage, StageContext, StageOutcome};
use crate::processors::{GifOps, ImageOps};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub algorithm: ResizeAlgorithm,
    /// Parent directory for per-request scratch directories. Defaults to the
    /// system temp dir.
    pub scratch_root: Option<PathBuf>,
    pub encoder_speed: i32,
    pub max_canvas: (u32, u32),
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            algorithm: ResizeAlgorithm::Lanczos3,
            scratch_root: None,
            encoder_speed: 10,
            max_canvas: (16_384, 16_384),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=30).contains(&self.encoder_speed) {
            return Err(OptimizeError::Validation(
                "Encoder speed must be between 1 and 30".to_string(),
            ));
        }

        let (max_w, max_h) = self.max_canvas;
        if max_w == 0 || max_h == 0 {
            return Err(OptimizeError::Validation(
                "Maximum canvas must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Runs requests through probe, the stage list and the final hand-off.
///
/// Each call is independent: it gets its own request id and scratch
/// directory, so one `Optimizer` can serve many threads at once.
pub struct Optimizer {
    config: OptimizerConfig,
    ops: Arc<dyn ImageOps>,
    stages: Vec<Box<dyn Stage>>,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        let ops: Arc<dyn ImageOps> = Arc::new(GifOps::new(&config));
        Self::with_ops(config, ops)
    }

    pub fn with_ops(config: OptimizerConfig, ops: Arc<dyn ImageOps>) -> Self {
        Self {
            config,
            ops,
            stages: default_stages(),
        }
    }

    pub fn with_stages(mut self, stages: Vec<Box<dyn Stage>>) -> Self {
        self.stages = stages;
        self
    }

    pub fn probe(&self, asset: &Path) -> Result<ImageMetadata> {
        MetadataProbe::probe(self.ops.as_ref(), asset)
    }

    pub fn optimize(&self, request: &OptimizationRequest) -> Result<OptimizationReport> {
        self.optimize_with_cancel(request, &CancelToken::new())
    }

    pub fn optimize_with_cancel(
        &self,
        request: &OptimizationRequest,
        cancel: &CancelToken,
    ) -> Result<OptimizationReport> {
        request.validate()?;

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let mut tracker = StateTracker::new(request_id);

        log::info!(
            "[{}] optimizing {} (budget {} bytes)",
            request_id,
            request.source.display(),
            request.max_size_bytes
        );

        let run = self.run(request, cancel, request_id, &mut tracker);

        match &run {
            Ok((original, result)) => log::info!(
                "[{}] finished as {} in {:.2?} ({} bytes originally): {:?}",
                request_id,
                tracker.state(),
                started.elapsed(),
                original.size_bytes,
                result
            ),
            Err(e) => {
                tracker.fail();
                log::error!("[{}] failed after {:.2?}: {}", request_id, started.elapsed(), e);
            }
        }

        let (original, result) = run?;
        Ok(OptimizationReport {
            request_id,
            original,
            result,
            states: tracker.into_history(),
        })
    }

    fn run(
        &self,
        request: &OptimizationRequest,
        cancel: &CancelToken,
        request_id: Uuid,
        tracker: &mut StateTracker,
    ) -> Result<(ImageMetadata, OptimizationResult)> {
        let original = MetadataProbe::probe(self.ops.as_ref(), &request.source)?;
        tracker.advance(PipelineState::Probed)?;
        log::debug!("[{}] original {:?}", request_id, original);

        // Dropping the scratch store on any path below deletes every
        // intermediate that was not persisted.
        let mut scratch = Scratch::new(self.config.scratch_root.as_deref(), request_id)?;
        let start = Artifact {
            path: request.source.clone(),
            metadata: original,
        };
        let mut last = original;

        let outcome = self.run_stages(request, cancel, &mut scratch, tracker, start, &mut last);

        let result = match outcome {
            Ok(StageOutcome::Complete(artifact)) => {
                if artifact.metadata.size_bytes > request.max_size_bytes {
                    return Err(OptimizeError::Processing(format!(
                        "Completed artifact is {} bytes, over the {} byte budget",
                        artifact.metadata.size_bytes, request.max_size_bytes
                    )));
                }
                scratch.persist(&artifact.path, &request.output)?;
                tracker.advance(PipelineState::Done)?;
                OptimizationResult::Success {
                    output: request.output.clone(),
                    metadata: artifact.metadata,
                }
            }
            Ok(StageOutcome::Halt(result)) => {
                if matches!(result, OptimizationResult::Failed { .. }) {
                    tracker.advance(PipelineState::Failed)?;
                }
                result
            }
            Ok(StageOutcome::Continue(artifact)) => {
                // Every stage handed on without finishing the job.
                tracker.advance(PipelineState::Failed)?;
                OptimizationResult::Failed {
                    reason: FailureReason::BudgetUnreachable,
                    best_achieved_size_bytes: artifact.metadata.size_bytes,
                    frame_count: artifact.metadata.frame_count,
                }
            }
            Err(OptimizeError::Cancelled) => {
                log::warn!("[{}] cancelled in state {}", request_id, tracker.state());
                tracker.advance(PipelineState::Failed)?;
                OptimizationResult::Failed {
                    reason: FailureReason::Cancelled,
                    best_achieved_size_bytes: last.size_bytes,
                    frame_count: last.frame_count,
                }
            }
            Err(e) => return Err(e),
        };

        Ok((original, result))
    }

    fn run_stages(
        &self,
        request: &OptimizationRequest,
        cancel: &CancelToken,
        scratch: &mut Scratch,
        tracker: &mut StateTracker,
        start: Artifact,
        last: &mut ImageMetadata,
    ) -> Result<StageOutcome> {
        let mut current = start;

        for stage in &self.stages {
            cancel.check()?;

            if let Some(state) = stage.entry_state() {
                tracker.advance(state)?;
            }

            log::debug!("[{}] running {}", tracker.request_id, stage.name());

            let mut ctx = StageContext {
                ops: self.ops.as_ref(),
                request,
                scratch: &mut *scratch,
                cancel,
            };

            match stage.attempt(&mut ctx, current)? {
                StageOutcome::Continue(next) => {
                    *last = next.metadata;
                    tracker.advance(stage.exit_state())?;
                    current = next;
                }
                StageOutcome::Complete(done) => {
                    *last = done.metadata;
                    tracker.advance(stage.exit_state())?;
                    return Ok(StageOutcome::Complete(done));
                }
                halt @ StageOutcome::Halt(_) => return Ok(halt),
            }
        }

        Ok(StageOutcome::Continue(current))
    }
}

/// Records the forward-only walk through [`PipelineState`].
struct StateTracker {
    request_id: Uuid,
    history: Vec<PipelineState>,
}

impl StateTracker {
    fn new(request_id: Uuid) -> Self {
        Self {
            request_id,
            history: vec![PipelineState::Init],
        }
    }

    fn state(&self) -> PipelineState {
        self.history.last().copied().unwrap_or(PipelineState::Init)
    }

    /// Re-entering the current state is a no-op.
    fn advance(&mut self, next: PipelineState) -> Result<()> {
        let current = self.state();
        if current == next {
            return Ok(());
        }

        if !current.can_advance_to(next) {
            return Err(OptimizeError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        log::debug!("[{}] {} -> {}", self.request_id, current, next);
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self) {
        if !self.state().is_terminal() {
            self.history.push(PipelineState::Failed);
        }
    }

    fn into_history(self) -> Vec<PipelineState> {
        self.history
    }
}
