// animfit/src/pipeline/probe.rs
use crate::core::{ImageMetadata, OptimizeError, Result};
use crate::processors::ImageOps;
use std::path::Path;

/// Reads asset metadata and rejects snapshots the pipeline cannot work with.
pub struct MetadataProbe;

impl MetadataProbe {
    /// Probes the caller's source asset. Any failure is a [`OptimizeError::Probe`].
    pub fn probe(ops: &dyn ImageOps, asset: &Path) -> Result<ImageMetadata> {
        let metadata = ops.probe(asset).map_err(|e| match e {
            OptimizeError::Probe(msg) => OptimizeError::Probe(msg),
            other => OptimizeError::Probe(format!("{}: {}", asset.display(), other)),
        })?;
        Self::check(metadata).map_err(OptimizeError::Probe)
    }

    /// Probes an asset the pipeline just produced. A bad intermediate means
    /// the transform failed, so errors surface as processing errors.
    pub fn probe_intermediate(ops: &dyn ImageOps, asset: &Path) -> Result<ImageMetadata> {
        let metadata = ops.probe(asset).map_err(|e| match e {
            OptimizeError::Probe(msg) => OptimizeError::Processing(msg),
            other => other,
        })?;
        Self::check(metadata).map_err(OptimizeError::Processing)
    }

    fn check(metadata: ImageMetadata) -> std::result::Result<ImageMetadata, String> {
        if metadata.frame_count == 0 {
            return Err("asset reports zero frames".to_string());
        }
        if metadata.width == 0 || metadata.height == 0 {
            return Err(format!(
                "asset reports an empty canvas {}x{}",
                metadata.width, metadata.height
            ));
        }
        Ok(metadata)
    }
}
