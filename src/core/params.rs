// animfit/src/core/params.rs
//! Request and response shapes exchanged with callers of the pipeline.

use super::{
    OptimizationReport, OptimizationRequest, OptimizationResult, OptimizeError, Result,
    DEFAULT_MIN_DIMENSION,
};
use crate::utils::format_file_size;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
pub const PRESET_MAX_FILE_SIZE_MB: f64 = 2.0;

const MIN_FILE_SIZE_MB: f64 = 0.1;
const MAX_FILE_SIZE_MB: f64 = 50.0;
const MAX_MIN_DIMENSION: u32 = 2000;
const MAX_MAX_DIMENSION: u32 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Preset,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizeParams {
    pub mode: Mode,
    #[serde(rename = "maxFileSizeMB")]
    pub max_file_size_mb: Option<f64>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub allow_frame_reduction: bool,
}

impl OptimizeParams {
    pub fn preset() -> Self {
        Self::default()
    }

    pub fn from_json(data: &str) -> Result<Self> {
        serde_json::from_str(data)
            .map_err(|e| OptimizeError::Validation(format!("Malformed parameters: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.mode == Mode::Preset {
            return Ok(());
        }

        let size = self.max_file_size_mb.ok_or_else(|| {
            OptimizeError::Validation("maxFileSizeMB is required in custom mode".to_string())
        })?;
        if !size.is_finite() || !(MIN_FILE_SIZE_MB..=MAX_FILE_SIZE_MB).contains(&size) {
            return Err(OptimizeError::Validation(format!(
                "maxFileSizeMB must be between {} and {}",
                MIN_FILE_SIZE_MB, MAX_FILE_SIZE_MB
            )));
        }

        let (min_w, min_h) = self.min_dimensions();
        for (name, value) in [("minWidth", min_w), ("minHeight", min_h)] {
            if !(1..=MAX_MIN_DIMENSION).contains(&value) {
                return Err(OptimizeError::Validation(format!(
                    "{} must be between 1 and {}",
                    name, MAX_MIN_DIMENSION
                )));
            }
        }

        for (name, max, min) in [
            ("maxWidth", self.max_width, min_w),
            ("maxHeight", self.max_height, min_h),
        ] {
            if let Some(max) = max {
                if max > MAX_MAX_DIMENSION {
                    return Err(OptimizeError::Validation(format!(
                        "{} must not exceed {}",
                        name, MAX_MAX_DIMENSION
                    )));
                }
                if max < min {
                    return Err(OptimizeError::Validation(format!(
                        "{} ({}) must be at least the matching minimum ({})",
                        name, max, min
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn max_size_bytes(&self) -> u64 {
        let mb = match self.mode {
            Mode::Preset => PRESET_MAX_FILE_SIZE_MB,
            Mode::Custom => self.max_file_size_mb.unwrap_or(PRESET_MAX_FILE_SIZE_MB),
        };
        (mb * BYTES_PER_MB).round() as u64
    }

    fn min_dimensions(&self) -> (u32, u32) {
        match self.mode {
            Mode::Preset => (DEFAULT_MIN_DIMENSION, DEFAULT_MIN_DIMENSION),
            Mode::Custom => (
                self.min_width.unwrap_or(DEFAULT_MIN_DIMENSION),
                self.min_height.unwrap_or(DEFAULT_MIN_DIMENSION),
            ),
        }
    }

    fn max_dimensions(&self) -> (Option<u32>, Option<u32>) {
        match self.mode {
            Mode::Preset => (None, None),
            Mode::Custom => (self.max_width, self.max_height),
        }
    }

    /// Validates and turns the parameters into a pipeline request. Nothing
    /// reaches the pipeline unless this succeeds.
    pub fn into_request(self, source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Result<OptimizationRequest> {
        self.validate()?;

        let (min_w, min_h) = self.min_dimensions();
        let (max_w, max_h) = self.max_dimensions();
        let request = OptimizationRequest::new(source, output, self.max_size_bytes())
            .with_min_dimensions(min_w, min_h)
            .with_max_dimensions(max_w, max_h)
            .with_frame_reduction(self.allow_frame_reduction);

        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessBody {
    pub original_width: u32,
    pub original_height: u32,
    pub final_width: u32,
    pub final_height: u32,
    pub frame_count: u32,
    pub final_size_bytes: u64,
    pub original_size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBody {
    pub requires_approval: bool,
    pub approval_message: String,
    pub estimated_frame_reduction_percent: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub frame_count: u32,
    pub original_size_bytes: u64,
}

/// JSON body returned to callers; exactly one shape per outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptimizeResponse {
    Success(SuccessBody),
    ApprovalRequired(ApprovalBody),
    Error { error: String },
}

impl OptimizeResponse {
    pub fn from_report(report: &OptimizationReport) -> Self {
        let original = report.original;

        match &report.result {
            OptimizationResult::Success { metadata, .. } => OptimizeResponse::Success(SuccessBody {
                original_width: original.width,
                original_height: original.height,
                final_width: metadata.width,
                final_height: metadata.height,
                frame_count: metadata.frame_count,
                final_size_bytes: metadata.size_bytes,
                original_size_bytes: original.size_bytes,
            }),
            OptimizationResult::ApprovalRequired {
                estimated_frame_reduction_percent,
                current_size_bytes,
                target_size_bytes,
            } => OptimizeResponse::ApprovalRequired(ApprovalBody {
                requires_approval: true,
                approval_message: approval_message(
                    *estimated_frame_reduction_percent,
                    *current_size_bytes,
                    *target_size_bytes,
                ),
                estimated_frame_reduction_percent: *estimated_frame_reduction_percent,
                original_width: original.width,
                original_height: original.height,
                frame_count: original.frame_count,
                original_size_bytes: original.size_bytes,
            }),
            OptimizationResult::Failed {
                reason,
                best_achieved_size_bytes,
                frame_count,
            } => OptimizeResponse::Error {
                error: format!(
                    "Optimization failed ({}): best result was {} with {} frame(s)",
                    reason,
                    format_file_size(*best_achieved_size_bytes),
                    frame_count
                ),
            },
        }
    }

    pub fn error(err: impl fmt::Display) -> Self {
        OptimizeResponse::Error {
            error: err.to_string(),
        }
    }

    /// Process exit code for the CLI: 0 success, 2 approval needed, 1 error.
    pub fn exit_code(&self) -> i32 {
        match self {
            OptimizeResponse::Success(_) => 0,
            OptimizeResponse::ApprovalRequired(_) => 2,
            OptimizeResponse::Error { .. } => 1,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

fn approval_message(percent: u32, current: u64, target: u64) -> String {
    format!(
        "The animation is still {} after color reduction, above the {} limit. \
         Meeting the limit requires removing roughly {}% of its frames. \
         Resubmit the original file with frame reduction allowed to continue.",
        format_file_size(current),
        format_file_size(target),
        percent
    )
}
