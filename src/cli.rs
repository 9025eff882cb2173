// animfit/src/cli.rs
use crate::core::{Mode, OptimizeParams, ResizeAlgorithm};
use crate::processors::DEFAULT_MEMORY_BUDGET_MB;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "animfit", version, about = "Fit animated GIFs under a size budget and dimension bounds")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimize a single GIF and print the JSON response
    Optimize {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        constraints: ConstraintArgs,

        #[command(flatten)]
        engine: EngineArgs,
    },

    /// Optimize every GIF in a directory in parallel
    Batch {
        input: PathBuf,

        output: PathBuf,

        #[command(flatten)]
        constraints: ConstraintArgs,

        #[command(flatten)]
        engine: EngineArgs,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, default_value_t = 0)]
        threads: usize,

        /// Decoded frame memory shared by all workers, in MB
        #[arg(long, default_value_t = DEFAULT_MEMORY_BUDGET_MB)]
        max_memory_mb: u64,

        #[arg(short, long)]
        recursive: bool,
    },

    /// Show dimensions, frame count and size of a GIF
    Info { input: PathBuf },
}

#[derive(Args, Debug, Clone)]
pub struct ConstraintArgs {
    #[arg(long, value_enum, default_value_t = ModeArg::Preset)]
    pub mode: ModeArg,

    /// Size budget in MB (custom mode, 0.1-50)
    #[arg(long)]
    pub max_size_mb: Option<f64>,

    #[arg(long)]
    pub min_width: Option<u32>,

    #[arg(long)]
    pub min_height: Option<u32>,

    #[arg(long)]
    pub max_width: Option<u32>,

    #[arg(long)]
    pub max_height: Option<u32>,

    /// Consent to dropping frames when color reduction is not enough
    #[arg(long)]
    pub allow_frame_reduction: bool,

    /// Read parameters from a JSON document instead of flags
    #[arg(long, conflicts_with_all = ["mode", "max_size_mb", "min_width", "min_height", "max_width", "max_height"])]
    pub params: Option<PathBuf>,
}

impl ConstraintArgs {
    pub fn to_params(&self) -> anyhow::Result<OptimizeParams> {
        if let Some(path) = &self.params {
            let data = std::fs::read_to_string(path)?;
            let mut params = OptimizeParams::from_json(&data)?;
            params.allow_frame_reduction |= self.allow_frame_reduction;
            return Ok(params);
        }

        Ok(OptimizeParams {
            mode: self.mode.into(),
            max_file_size_mb: self.max_size_mb,
            min_width: self.min_width,
            min_height: self.min_height,
            max_width: self.max_width,
            max_height: self.max_height,
            allow_frame_reduction: self.allow_frame_reduction,
        })
    }
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[arg(long, value_enum, default_value_t = Algorithm::Lanczos3)]
    pub algorithm: Algorithm,

    /// Palette quantizer speed, 1 (best) to 30 (fastest)
    #[arg(long, default_value_t = 10)]
    pub speed: i32,

    /// Directory for temporary artifacts
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Preset,
    Custom,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Preset => Mode::Preset,
            ModeArg::Custom => Mode::Custom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl From<Algorithm> for ResizeAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Nearest => ResizeAlgorithm::Nearest,
            Algorithm::Bilinear => ResizeAlgorithm::Bilinear,
            Algorithm::Bicubic => ResizeAlgorithm::Bicubic,
            Algorithm::Lanczos3 => ResizeAlgorithm::Lanczos3,
        }
    }
}
