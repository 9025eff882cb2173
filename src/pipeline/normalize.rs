// animfit/src/pipeline/normalize.rs
use super::{ensure_frame_count, Artifact, Stage, StageContext, StageOutcome};
use crate::core::{DimensionBounds, OptimizeError, PipelineState, Result};

/// What the normalizer will do to a canvas: an optional aspect-preserving
/// downscale followed by an optional centred pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimensionPlan {
    pub resize: Option<(u32, u32)>,
    pub pad: Option<(u32, u32)>,
}

impl DimensionPlan {
    pub fn is_pass_through(&self) -> bool {
        self.resize.is_none() && self.pad.is_none()
    }

    pub fn final_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        self.pad.or(self.resize).unwrap_or((width, height))
    }
}

/// Plans the transforms that bring `width` x `height` inside `bounds`.
///
/// Content is only ever scaled down, and only to fit the maximums. Any axis
/// left below its minimum is padded, never stretched or cropped.
pub fn plan_dimensions(width: u32, height: u32, bounds: &DimensionBounds) -> DimensionPlan {
    if bounds.contains(width, height) {
        return DimensionPlan::default();
    }

    let scale_w = bounds.max_width.map_or(1.0, |max| f64::from(max) / f64::from(width));
    let scale_h = bounds.max_height.map_or(1.0, |max| f64::from(max) / f64::from(height));
    let scale = scale_w.min(scale_h).min(1.0);

    let resize = if scale < 1.0 {
        let w = scaled(width, scale, bounds.max_width);
        let h = scaled(height, scale, bounds.max_height);
        Some((w, h))
    } else {
        None
    };

    let (w, h) = resize.unwrap_or((width, height));
    let target = (w.max(bounds.min_width), h.max(bounds.min_height));
    let pad = if target != (w, h) { Some(target) } else { None };

    DimensionPlan { resize, pad }
}

fn scaled(value: u32, scale: f64, max: Option<u32>) -> u32 {
    let result = (f64::from(value) * scale).round() as u32;
    let result = result.max(1);
    max.map_or(result, |max| result.min(max))
}

/// Brings the canvas within the request's min/max bounds.
pub struct DimensionNormalizer;

impl Stage for DimensionNormalizer {
    fn name(&self) -> &'static str {
        "dimension-normalizer"
    }

    fn exit_state(&self) -> PipelineState {
        PipelineState::DimensionNormalized
    }

    fn attempt(&self, ctx: &mut StageContext<'_>, input: Artifact) -> Result<StageOutcome> {
        let bounds = ctx.request.bounds();
        let (width, height) = (input.metadata.width, input.metadata.height);
        let plan = plan_dimensions(width, height, &bounds);

        if plan.is_pass_through() {
            log::debug!("{}x{} already within bounds", width, height);
            return Ok(StageOutcome::Continue(input));
        }

        let mut current = input;

        if let Some((w, h)) = plan.resize {
            log::info!("Downscaling {}x{} to {}x{}", width, height, w, h);
            let src = current.path.clone();
            let next = ctx.derive("resize", |ops, dst| ops.resize(&src, dst, w, h))?;
            ensure_frame_count(self.name(), &current, &next)?;
            ctx.scratch.discard(&current.path);
            current = next;
        }

        if let Some((w, h)) = plan.pad {
            let fill = ctx.ops.dominant_edge_color(&current.path)?;
            log::info!(
                "Padding {}x{} to {}x{} with fill {:?}",
                current.metadata.width,
                current.metadata.height,
                w,
                h,
                fill
            );
            let src = current.path.clone();
            let next = ctx.derive("pad", |ops, dst| ops.pad_canvas(&src, dst, w, h, fill))?;
            ensure_frame_count(self.name(), &current, &next)?;
            ctx.scratch.discard(&current.path);
            current = next;
        }

        let (w, h) = (current.metadata.width, current.metadata.height);
        if !bounds.contains(w, h) {
            return Err(OptimizeError::Processing(format!(
                "Normalized canvas {}x{} is still outside the requested bounds",
                w, h
            )));
        }

        Ok(StageOutcome::Continue(current))
    }
}
