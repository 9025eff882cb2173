// animfit/src/processors/loader.rs
use crate::core::{ImageMetadata, OptimizeError, Result};
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, Delay, Frame};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

#[derive(Clone)]
pub struct Loader {
    max_dimensions: Option<(u32, u32)>,
}

impl Loader {
    pub fn new() -> Self {
        Self {
            max_dimensions: Some((16_384, 16_384)),
        }
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_dimensions = Some((width, height));
        self
    }

    /// Reads canvas size and frame count without compositing any frame.
    pub fn probe(&self, path: &Path) -> Result<ImageMetadata> {
        log::debug!("Probing {}", path.display());

        let size_bytes = self.validate_path(path)?;

        let file = File::open(path)?;
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(BufReader::new(file)).map_err(|e| {
            OptimizeError::Probe(format!("{} is not a readable GIF: {}", path.display(), e))
        })?;

        let width = u32::from(decoder.width());
        let height = u32::from(decoder.height());
        self.check_dimensions(width, height)?;

        let mut frame_count = 0u32;
        loop {
            match decoder.read_next_frame() {
                Ok(Some(_)) => frame_count += 1,
                Ok(None) => break,
                Err(e) => {
                    return Err(OptimizeError::Probe(format!(
                        "Corrupt frame {} in {}: {}",
                        frame_count,
                        path.display(),
                        e
                    )))
                }
            }
        }

        if frame_count == 0 {
            return Err(OptimizeError::Probe(format!(
                "{} contains no frames",
                path.display()
            )));
        }

        let metadata = ImageMetadata {
            width,
            height,
            frame_count,
            size_bytes,
        };
        log::debug!("Probed {}: {:?}", path.display(), metadata);

        Ok(metadata)
    }

    /// Largest colour table any frame is drawn from, as stored in the file.
    /// GIF tables are padded to a power of two, so a 48-colour palette reads
    /// back as 64.
    pub fn palette_colors(&self, path: &Path) -> Result<u16> {
        self.validate_path(path)?;

        let file = File::open(path)?;
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::Indexed);
        let mut decoder = options.read_info(BufReader::new(file)).map_err(|e| {
            OptimizeError::Processing(format!("Failed to read palette of {}: {}", path.display(), e))
        })?;

        let mut entries = decoder.global_palette().map_or(0, |palette| palette.len() / 3);
        while let Some(frame) = decoder.read_next_frame().map_err(|e| {
            OptimizeError::Processing(format!("Failed to read palette of {}: {}", path.display(), e))
        })? {
            if let Some(local) = &frame.palette {
                entries = entries.max(local.len() / 3);
            }
        }

        if entries == 0 {
            entries = 256;
        }
        Ok(entries.min(256) as u16)
    }

    /// Decodes every frame as a full composited canvas.
    ///
    /// The whole animation is held as RGBA, `width * height * 4` bytes per
    /// frame, until the caller drops it.
    pub fn load_frames(&self, path: &Path) -> Result<Vec<Frame>> {
        log::debug!("Decoding frames from: {}", path.display());

        self.validate_path(path)?;

        let decoder = self.open_decoder(path)?;
        let frames = decoder.into_frames().collect_frames().map_err(|e| {
            OptimizeError::Processing(format!("Failed to decode frames: {}", e))
        })?;

        if frames.is_empty() {
            return Err(OptimizeError::Processing(format!(
                "{} decoded to zero frames",
                path.display()
            )));
        }

        log::debug!("Decoded {} frames from {}", frames.len(), path.display());

        Ok(frames)
    }

    pub fn load_first_frame(&self, path: &Path) -> Result<Frame> {
        self.validate_path(path)?;

        let decoder = self.open_decoder(path)?;
        decoder
            .into_frames()
            .next()
            .ok_or_else(|| OptimizeError::Processing(format!("{} has no frames", path.display())))?
            .map_err(|e| OptimizeError::Processing(format!("Failed to decode first frame: {}", e)))
    }

    fn open_decoder(&self, path: &Path) -> Result<GifDecoder<BufReader<File>>> {
        let file = File::open(path)?;
        GifDecoder::new(BufReader::new(file)).map_err(|e| {
            OptimizeError::Processing(format!("Failed to open {}: {}", path.display(), e))
        })
    }

    fn check_dimensions(&self, width: u32, height: u32) -> Result<()> {
        if let Some((max_w, max_h)) = self.max_dimensions {
            if width > max_w || height > max_h {
                return Err(OptimizeError::Probe(format!(
                    "Canvas {}x{} exceeds maximum {}x{}",
                    width, height, max_w, max_h
                )));
            }
        }

        if width == 0 || height == 0 {
            return Err(OptimizeError::Probe(format!(
                "Canvas {}x{} is empty",
                width, height
            )));
        }

        Ok(())
    }

    fn validate_path(&self, path: &Path) -> Result<u64> {
        if !path.exists() {
            return Err(OptimizeError::Probe(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        let metadata = path.metadata()?;
        if metadata.len() == 0 {
            return Err(OptimizeError::Probe(format!(
                "File is empty: {}",
                path.display()
            )));
        }

        Ok(metadata.len())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the frames at `indices` (ascending) in order. Each kept frame also
/// takes over the display time of the dropped frames that follow it.
pub fn select_frames(frames: Vec<Frame>, indices: &[usize]) -> Result<Vec<Frame>> {
    if indices.is_empty() {
        return Err(OptimizeError::Processing(
            "Frame selection must keep at least one frame".to_string(),
        ));
    }

    if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(OptimizeError::Processing(
            "Frame indices must be strictly ascending".to_string(),
        ));
    }

    if let Some(&last) = indices.last() {
        if last >= frames.len() {
            return Err(OptimizeError::Processing(format!(
                "Frame index {} out of range for {} frames",
                last,
                frames.len()
            )));
        }
    }

    let delays: Vec<u32> = frames.iter().map(|frame| delay_ms(frame.delay())).collect();
    let mut selected = Vec::with_capacity(indices.len());
    let mut frames: Vec<Option<Frame>> = frames.into_iter().map(Some).collect();

    for (position, &index) in indices.iter().enumerate() {
        let span_end = indices.get(position + 1).copied().unwrap_or(delays.len());
        let total_ms: u32 = delays[index..span_end].iter().sum();

        let frame = frames[index]
            .take()
            .ok_or_else(|| OptimizeError::Processing(format!("Frame {} selected twice", index)))?;
        let left = frame.left();
        let top = frame.top();
        selected.push(Frame::from_parts(
            frame.into_buffer(),
            left,
            top,
            Delay::from_numer_denom_ms(total_ms, 1),
        ));
    }

    Ok(selected)
}

pub(crate) fn delay_ms(delay: Delay) -> u32 {
    let (numer, denom) = delay.numer_denom_ms();
    let denom = denom.max(1);
    (numer + denom / 2) / denom
}
