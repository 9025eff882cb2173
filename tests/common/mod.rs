#![allow(dead_code)]

use animfit::{CancelToken, Color, ImageMetadata, ImageOps, OptimizeError, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgba, RgbaImage};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Synthetic asset: `full_size` is the encoded size at 256 colors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakeAsset {
    pub width: u32,
    pub height: u32,
    pub frames: u32,
    pub full_size: u64,
    pub colors: u16,
}

impl FakeAsset {
    pub fn new(width: u32, height: u32, frames: u32, size: u64) -> Self {
        Self {
            width,
            height,
            frames,
            full_size: size,
            colors: 256,
        }
    }

    /// 256 colors costs the full size, 32 colors costs 160/384 of it.
    pub fn size(&self) -> u64 {
        self.full_size * (128 + u64::from(self.colors)) / 384
    }

    fn scaled(self, width: u32, height: u32) -> Self {
        let old_area = u128::from(self.width) * u128::from(self.height);
        let new_area = u128::from(width) * u128::from(height);
        Self {
            width,
            height,
            full_size: (u128::from(self.full_size) * new_area / old_area) as u64,
            ..self
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Resize(u32, u32),
    Recolor(u16),
    Pad(u32, u32, Color),
    Sample(Vec<usize>),
    EdgeColor,
}

pub const EDGE_COLOR: Color = Color::rgba(10, 200, 30, 255);

/// Deterministic stand-in for a real codec. Assets live in a map keyed by
/// path; a small marker file is written for each so cleanup is observable.
#[derive(Default)]
pub struct FakeOps {
    assets: Mutex<HashMap<PathBuf, FakeAsset>>,
    calls: Mutex<Vec<Call>>,
    fail_on: Mutex<Option<&'static str>>,
    cancel_on_recolor: Mutex<Option<(u16, CancelToken)>>,
}

impl FakeOps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: &Path, asset: FakeAsset) {
        self.store(path, asset).unwrap();
    }

    pub fn fail_on(&self, operation: &'static str) {
        *self.fail_on.lock().unwrap() = Some(operation);
    }

    pub fn cancel_on_recolor(&self, colors: u16, token: CancelToken) {
        *self.cancel_on_recolor.lock().unwrap() = Some((colors, token));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn recolor_levels(&self) -> Vec<u16> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Recolor(colors) => Some(colors),
                _ => None,
            })
            .collect()
    }

    pub fn sample_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Sample(_)))
            .count()
    }

    fn store(&self, path: &Path, asset: FakeAsset) -> Result<()> {
        std::fs::write(path, format!("{:?}", asset))?;
        self.assets.lock().unwrap().insert(path.to_path_buf(), asset);
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<FakeAsset> {
        if !path.exists() {
            return Err(OptimizeError::Probe(format!("missing {}", path.display())));
        }
        self.assets
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .ok_or_else(|| OptimizeError::Probe(format!("not an animation: {}", path.display())))
    }

    fn record(&self, call: Call, operation: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(operation) {
            return Err(OptimizeError::Processing(format!("{} exploded", operation)));
        }
        Ok(())
    }
}

impl ImageOps for FakeOps {
    fn probe(&self, asset: &Path) -> Result<ImageMetadata> {
        let fake = self.load(asset)?;
        Ok(ImageMetadata {
            width: fake.width,
            height: fake.height,
            frame_count: fake.frames,
            size_bytes: fake.size(),
        })
    }

    fn resize(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<()> {
        self.record(Call::Resize(width, height), "resize")?;
        let asset = self.load(src)?;
        self.store(dst, asset.scaled(width, height))
    }

    fn recolor(&self, src: &Path, dst: &Path, colors: u16) -> Result<()> {
        self.record(Call::Recolor(colors), "recolor")?;
        if let Some((level, token)) = self.cancel_on_recolor.lock().unwrap().as_ref() {
            if *level == colors {
                token.cancel();
            }
        }
        let asset = self.load(src)?;
        self.store(
            dst,
            FakeAsset {
                colors: asset.colors.min(colors),
                ..asset
            },
        )
    }

    fn pad_canvas(&self, src: &Path, dst: &Path, width: u32, height: u32, fill: Color) -> Result<()> {
        self.record(Call::Pad(width, height, fill), "pad")?;
        let asset = self.load(src)?;
        self.store(dst, asset.scaled(width, height))
    }

    fn sample_frames(&self, src: &Path, dst: &Path, indices: &[usize]) -> Result<()> {
        self.record(Call::Sample(indices.to_vec()), "sample")?;
        let asset = self.load(src)?;
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(indices.iter().all(|&i| i < asset.frames as usize));

        let kept = indices.len() as u64;
        self.store(
            dst,
            FakeAsset {
                frames: kept as u32,
                full_size: asset.full_size * kept / u64::from(asset.frames),
                ..asset
            },
        )
    }

    fn dominant_edge_color(&self, asset: &Path) -> Result<Color> {
        self.record(Call::EdgeColor, "edge")?;
        self.load(asset)?;
        Ok(EDGE_COLOR)
    }
}

pub fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path).map(|mut d| d.next().is_none()).unwrap_or(true)
}

/// Pseudo-random RGB frames; identical seeds give identical frames.
pub fn noise_frames(width: u32, height: u32, count: usize, seed: u64) -> Vec<Frame> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..count)
        .map(|_| {
            let buffer = RgbaImage::from_fn(width, height, |_, _| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let v = (state >> 33) as u32;
                Rgba([v as u8, (v >> 8) as u8, (v >> 16) as u8, 255])
            });
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        })
        .collect()
}

/// Frames of `border` with a `center` square in the middle.
pub fn framed_frames(width: u32, height: u32, count: usize, border: [u8; 4], center: [u8; 4]) -> Vec<Frame> {
    (0..count)
        .map(|_| {
            let buffer = RgbaImage::from_fn(width, height, |x, y| {
                let inside = x >= width / 4 && x < width * 3 / 4 && y >= height / 4 && y < height * 3 / 4;
                Rgba(if inside { center } else { border })
            });
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1))
        })
        .collect()
}

pub fn write_gif(path: &Path, frames: Vec<Frame>) {
    let file = File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    encoder.encode_frames(frames).unwrap();
}

pub fn decode_frames(path: &Path) -> Vec<Frame> {
    use image::codecs::gif::GifDecoder;
    use image::AnimationDecoder;

    let file = std::io::BufReader::new(File::open(path).unwrap());
    GifDecoder::new(file).unwrap().into_frames().collect_frames().unwrap()
}
