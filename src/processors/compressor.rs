// animfit/src/processors/compressor.rs
use super::loader::delay_ms;
use crate::core::{OptimizeError, Result};
use color_quant::NeuQuant;
use image::{Frame, RgbaImage};
use std::borrow::Cow;
use std::path::Path;

/// Upper bound on pixels fed to the quantizer when learning a palette.
const MAX_SAMPLE_PIXELS: usize = 1 << 20;

const ALPHA_THRESHOLD: u8 = 128;

/// Encodes composited frames as a looping GIF with one shared palette of at
/// most `colors` entries.
pub struct Compressor {
    colors: u16,
    speed: i32,
}

impl Compressor {
    pub fn new(colors: u16) -> Self {
        Self {
            colors: colors.clamp(4, 256),
            speed: 10,
        }
    }

    /// NeuQuant sampling factor: 1 is slowest and most accurate, 30 fastest.
    pub fn with_speed(mut self, speed: i32) -> Self {
        self.speed = speed.clamp(1, 30);
        self
    }

    pub fn with_colors(&self, colors: u16) -> Self {
        Self {
            colors: colors.clamp(4, 256),
            speed: self.speed,
        }
    }

    pub fn save_frames(&self, frames: Vec<Frame>, path: &Path) -> Result<()> {
        log::debug!(
            "Encoding {} frames to {} with {} colors",
            frames.len(),
            path.display(),
            self.colors
        );

        let data = self.encode_frames(&frames)?;
        std::fs::write(path, data)?;

        self.log_save_result(path)
    }

    pub fn encode_frames(&self, frames: &[Frame]) -> Result<Vec<u8>> {
        let first = frames
            .first()
            .ok_or_else(|| OptimizeError::Processing("Cannot encode zero frames".to_string()))?;
        let (width, height) = first.buffer().dimensions();

        if frames.iter().any(|f| f.buffer().dimensions() != (width, height)) {
            return Err(OptimizeError::Processing(
                "All frames must share one canvas size".to_string(),
            ));
        }

        let (w16, h16) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(OptimizeError::Processing(format!(
                    "Canvas {}x{} exceeds the GIF limit of 65535",
                    width, height
                )))
            }
        };

        let has_transparency = frames.iter().any(|f| is_transparent(f.buffer()));
        let opaque_slots = if has_transparency {
            usize::from(self.colors) - 1
        } else {
            usize::from(self.colors)
        };

        let sample = sample_pixels(frames);
        let quantizer = NeuQuant::new(self.speed, opaque_slots, &sample);

        let mut palette = Vec::with_capacity(usize::from(self.colors) * 3);
        let offset = if has_transparency {
            palette.extend_from_slice(&[0, 0, 0]);
            1
        } else {
            0
        };
        palette.extend_from_slice(&quantizer.color_map_rgb());

        let mut output = Vec::new();
        {
            let mut encoder = gif::Encoder::new(&mut output, w16, h16, &palette).map_err(encode_error)?;
            encoder.set_repeat(gif::Repeat::Infinite).map_err(encode_error)?;

            for frame in frames {
                let indices = index_pixels(frame.buffer(), &quantizer, has_transparency, offset);
                let delay_cs = (delay_ms(frame.delay()) + 5) / 10;

                let gif_frame = gif::Frame {
                    width: w16,
                    height: h16,
                    delay: u16::try_from(delay_cs).unwrap_or(u16::MAX),
                    dispose: if has_transparency {
                        gif::DisposalMethod::Background
                    } else {
                        gif::DisposalMethod::Keep
                    },
                    transparent: if has_transparency { Some(0) } else { None },
                    buffer: Cow::Owned(indices),
                    ..gif::Frame::default()
                };
                encoder.write_frame(&gif_frame).map_err(encode_error)?;
            }
        }

        Ok(output)
    }

    fn log_save_result(&self, path: &Path) -> Result<()> {
        let file_size = std::fs::metadata(path)?.len();
        log::debug!("Saved {} ({} bytes, {} colors)", path.display(), file_size, self.colors);
        Ok(())
    }
}

fn encode_error(e: gif::EncodingError) -> OptimizeError {
    OptimizeError::Processing(format!("GIF encoding failed: {}", e))
}

fn is_transparent(buffer: &RgbaImage) -> bool {
    buffer.pixels().any(|p| p[3] < ALPHA_THRESHOLD)
}

/// Opaque pixels from every frame, strided so the sample stays bounded.
fn sample_pixels(frames: &[Frame]) -> Vec<u8> {
    let total: usize = frames
        .iter()
        .map(|f| f.buffer().width() as usize * f.buffer().height() as usize)
        .sum();
    let stride = (total / MAX_SAMPLE_PIXELS).max(1);

    let mut sample = Vec::with_capacity((total / stride + 1) * 4);
    for frame in frames {
        for pixel in frame.buffer().pixels().step_by(stride) {
            if pixel[3] >= ALPHA_THRESHOLD {
                sample.extend_from_slice(&[pixel[0], pixel[1], pixel[2], 255]);
            }
        }
    }

    if sample.is_empty() {
        sample.extend_from_slice(&[0, 0, 0, 255]);
    }

    sample
}

fn index_pixels(buffer: &RgbaImage, quantizer: &NeuQuant, has_transparency: bool, offset: u8) -> Vec<u8> {
    buffer
        .pixels()
        .map(|pixel| {
            if has_transparency && pixel[3] < ALPHA_THRESHOLD {
                0
            } else {
                let index = quantizer.index_of(&[pixel[0], pixel[1], pixel[2], 255]);
                // palette holds at most 256 entries
                index as u8 + offset
            }
        })
        .collect()
}
