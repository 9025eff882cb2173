// animfit/src/core/mod.rs
pub mod params;
pub mod processor;

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use params::{Mode, OptimizeParams, OptimizeResponse};
pub use processor::{Optimizer, OptimizerConfig};

pub const DEFAULT_MIN_DIMENSION: u32 = 180;

/// Palette depths tried by the size reducer, most colors first.
pub const PALETTE_LADDER: [u16; 7] = [256, 192, 128, 96, 64, 48, 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeAlgorithm {
    Nearest,
    Bilinear,
    Bicubic,
    #[default]
    Lanczos3,
}

/// One pipeline invocation's input. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub source: PathBuf,
    pub output: PathBuf,
    pub max_size_bytes: u64,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub allow_frame_reduction: bool,
}

impl OptimizationRequest {
    pub fn new(source: impl Into<PathBuf>, output: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            max_size_bytes,
            min_width: DEFAULT_MIN_DIMENSION,
            min_height: DEFAULT_MIN_DIMENSION,
            max_width: None,
            max_height: None,
            allow_frame_reduction: false,
        }
    }

    pub fn with_min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    pub fn with_max_dimensions(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_frame_reduction(mut self, allow: bool) -> Self {
        self.allow_frame_reduction = allow;
        self
    }

    pub fn bounds(&self) -> DimensionBounds {
        DimensionBounds {
            min_width: self.min_width,
            min_height: self.min_height,
            max_width: self.max_width,
            max_height: self.max_height,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_size_bytes == 0 {
            return Err(OptimizeError::Validation(
                "Maximum size must be greater than zero".to_string(),
            ));
        }

        if self.min_width == 0 || self.min_height == 0 {
            return Err(OptimizeError::Validation(
                "Minimum dimensions must be positive".to_string(),
            ));
        }

        for (axis, min, max) in [
            ("width", self.min_width, self.max_width),
            ("height", self.min_height, self.max_height),
        ] {
            if let Some(max) = max {
                if max < min {
                    return Err(OptimizeError::Validation(format!(
                        "Maximum {} {} is smaller than minimum {} {}",
                        axis, max, axis, min
                    )));
                }
            }
        }

        if names_same_file(&self.source, &self.output) {
            return Err(OptimizeError::Validation(format!(
                "Output path {} refers to the source asset",
                self.output.display()
            )));
        }

        Ok(())
    }
}

/// True when `output` resolves to the file at `source`, whether through
/// `..` segments, symlinks or a hard link.
fn names_same_file(source: &Path, output: &Path) -> bool {
    if source == output {
        return true;
    }

    let source_real = match fs::canonicalize(source) {
        Ok(path) => path,
        Err(_) => return lexical_absolute(source) == lexical_absolute(output),
    };

    if let Ok(output_real) = fs::canonicalize(output) {
        return output_real == source_real || same_inode(&source_real, &output_real);
    }

    // Output does not exist yet; resolve the directory it would land in.
    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), output.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name) == source_real,
        _ => {
            let output = lexical_absolute(output);
            output == source_real || output == lexical_absolute(source)
        }
    }
}

/// Absolute form of `path` with `.` and `..` folded away, without touching
/// the filesystem.
fn lexical_absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionBounds {
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

impl DimensionBounds {
    pub fn contains(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && height >= self.min_height
            && self.max_width.map_or(true, |max| width <= max)
            && self.max_height.map_or(true, |max| height <= max)
    }
}

/// Snapshot of an asset. Recomputed after every transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba([self.r, self.g, self.b, self.a])
    }
}

impl From<image::Rgba<u8>> for Color {
    fn from(pixel: image::Rgba<u8>) -> Self {
        let [r, g, b, a] = pixel.0;
        Self { r, g, b, a }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Init,
    Probed,
    DimensionNormalized,
    SizeReduced,
    ApprovalPending,
    FrameReducing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Transitions only move forward. `Failed` is reachable from any
    /// non-terminal state; nothing leaves a terminal state.
    pub fn can_advance_to(self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            PipelineState::Failed => true,
            PipelineState::FrameReducing => self == PipelineState::ApprovalPending,
            _ => next > self,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::Probed => "probed",
            PipelineState::DimensionNormalized => "dimension-normalized",
            PipelineState::SizeReduced => "size-reduced",
            PipelineState::ApprovalPending => "approval-pending",
            PipelineState::FrameReducing => "frame-reducing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    BudgetUnreachable,
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::BudgetUnreachable => f.write_str("size budget unreachable"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of one pipeline run. `ApprovalRequired` is a normal result,
/// not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizationResult {
    Success {
        output: PathBuf,
        metadata: ImageMetadata,
    },
    ApprovalRequired {
        estimated_frame_reduction_percent: u32,
        current_size_bytes: u64,
        target_size_bytes: u64,
    },
    Failed {
        reason: FailureReason,
        best_achieved_size_bytes: u64,
        frame_count: u32,
    },
}

impl OptimizationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, OptimizationResult::Success { .. })
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationReport {
    pub request_id: Uuid,
    pub original: ImageMetadata,
    pub result: OptimizationResult,
    pub states: Vec<PipelineState>,
}

impl OptimizationReport {
    pub fn final_state(&self) -> PipelineState {
        self.states.last().copied().unwrap_or(PipelineState::Init)
    }
}

/// Cooperative cancellation shared between a caller and a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(OptimizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid parameter: {0}")]
    Validation(String),

    #[error("Unreadable asset: {0}")]
    Probe(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Invalid pipeline transition from {from} to {to}")]
    InvalidTransition {
        from: PipelineState,
        to: PipelineState,
    },

    #[error("Optimization cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, OptimizeError>;
