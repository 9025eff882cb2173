// animfit/src/processors/mod.rs
mod batch;
mod compressor;
mod loader;
mod resizer;

pub use batch::{BatchProcessor, BatchStats, DEFAULT_MEMORY_BUDGET_MB};
pub use compressor::Compressor;
pub use loader::Loader;
pub use resizer::Resizer;

use crate::core::{Color, ImageMetadata, OptimizerConfig, Result};
use std::path::Path;

/// Asset-level operations the pipeline is built on.
///
/// Every transform reads `src` and writes a new asset to `dst`; inputs are
/// never modified in place.
pub trait ImageOps: Send + Sync {
    fn probe(&self, asset: &Path) -> Result<ImageMetadata>;

    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<()>;

    fn recolor(&self, src: &Path, dst: &Path, colors: u16) -> Result<()>;

    fn pad_canvas(&self, src: &Path, dst: &Path, width: u32, height: u32, fill: Color) -> Result<()>;

    fn sample_frames(&self, src: &Path, dst: &Path, indices: &[usize]) -> Result<()>;

    fn dominant_edge_color(&self, asset: &Path) -> Result<Color>;
}

/// GIF implementation of [`ImageOps`] on top of the `image` and `gif` crates.
pub struct GifOps {
    loader: Loader,
    resizer: Resizer,
    compressor: Compressor,
}

impl GifOps {
    pub fn new(config: &OptimizerConfig) -> Self {
        let (max_w, max_h) = config.max_canvas;
        Self {
            loader: Loader::new().with_max_dimensions(max_w, max_h),
            resizer: Resizer::new(config.algorithm),
            compressor: Compressor::new(256).with_speed(config.encoder_speed),
        }
    }

    /// Encoder capped at the palette size `src` already uses, so
    /// re-encoding never widens a reduced palette.
    fn encoder_for(&self, src: &Path, colors: u16) -> Result<Compressor> {
        let current = self.loader.palette_colors(src)?;
        Ok(self.compressor.with_colors(colors.min(current)))
    }
}

impl Default for GifOps {
    fn default() -> Self {
        Self::new(&OptimizerConfig::default())
    }
}

impl ImageOps for GifOps {
    fn probe(&self, asset: &Path) -> Result<ImageMetadata> {
        self.loader.probe(asset)
    }

    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<()> {
        let frames = self.loader.load_frames(src)?;
        let resized = self.resizer.resize_frames(frames, width, height);
        self.encoder_for(src, 256)?.save_frames(resized, dst)
    }

    fn recolor(&self, src: &Path, dst: &Path, colors: u16) -> Result<()> {
        let frames = self.loader.load_frames(src)?;
        self.encoder_for(src, colors)?.save_frames(frames, dst)
    }

    fn pad_canvas(&self, src: &Path, dst: &Path, width: u32, height: u32, fill: Color) -> Result<()> {
        let frames = self.loader.load_frames(src)?;
        let padded = self.resizer.pad_frames(frames, width, height, fill);
        self.encoder_for(src, 256)?.save_frames(padded, dst)
    }

    fn sample_frames(&self, src: &Path, dst: &Path, indices: &[usize]) -> Result<()> {
        let frames = self.loader.load_frames(src)?;
        let sampled = loader::select_frames(frames, indices)?;
        self.encoder_for(src, 256)?.save_frames(sampled, dst)
    }

    fn dominant_edge_color(&self, asset: &Path) -> Result<Color> {
        let first = self.loader.load_first_frame(asset)?;
        Ok(self.resizer.edge_color(&first))
    }
}
