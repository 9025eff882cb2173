// animfit/src/processors/resizer.rs
use crate::core::{Color, ResizeAlgorithm};
use image::{imageops, imageops::FilterType, Frame, RgbaImage};
use std::collections::HashMap;

pub struct Resizer {
    algorithm: ResizeAlgorithm,
}

impl Resizer {
    pub fn new(algorithm: ResizeAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Resizes every frame to exactly `width` x `height`. Callers compute the
    /// aspect-preserving target beforehand.
    pub fn resize_frames(&self, frames: Vec<Frame>, width: u32, height: u32) -> Vec<Frame> {
        let filter = self.get_filter_type();

        frames
            .into_iter()
            .map(|frame| {
                let delay = frame.delay();
                let buffer = frame.into_buffer();

                if buffer.width() == width && buffer.height() == height {
                    return Frame::from_parts(buffer, 0, 0, delay);
                }

                log::debug!(
                    "Resizing frame from {}x{} to {}x{}",
                    buffer.width(),
                    buffer.height(),
                    width,
                    height
                );

                let resized = imageops::resize(&buffer, width, height, filter);
                Frame::from_parts(resized, 0, 0, delay)
            })
            .collect()
    }

    /// Places every frame centred on a `width` x `height` canvas filled with
    /// `fill`. Content is never scaled.
    pub fn pad_frames(&self, frames: Vec<Frame>, width: u32, height: u32, fill: Color) -> Vec<Frame> {
        frames
            .into_iter()
            .map(|frame| {
                let delay = frame.delay();
                let buffer = frame.into_buffer();
                let mut canvas = RgbaImage::from_pixel(width, height, fill.to_rgba());

                let x = i64::from(width.saturating_sub(buffer.width()) / 2);
                let y = i64::from(height.saturating_sub(buffer.height()) / 2);
                imageops::replace(&mut canvas, &buffer, x, y);

                Frame::from_parts(canvas, 0, 0, delay)
            })
            .collect()
    }

    /// Most frequent colour among the four corners; ties go to the top-left.
    pub fn edge_color(&self, frame: &Frame) -> Color {
        let buffer = frame.buffer();
        let (w, h) = buffer.dimensions();
        let corners = [
            buffer.get_pixel(0, 0),
            buffer.get_pixel(w - 1, 0),
            buffer.get_pixel(0, h - 1),
            buffer.get_pixel(w - 1, h - 1),
        ];

        let mut counts: HashMap<Color, usize> = HashMap::new();
        for pixel in corners {
            *counts.entry(Color::from(*pixel)).or_insert(0) += 1;
        }

        let mut best = Color::from(*corners[0]);
        let mut best_count = counts[&best];
        for pixel in &corners[1..] {
            let color = Color::from(**pixel);
            if counts[&color] > best_count {
                best = color;
                best_count = counts[&color];
            }
        }

        best
    }

    fn get_filter_type(&self) -> FilterType {
        match self.algorithm {
            ResizeAlgorithm::Nearest => FilterType::Nearest,
            ResizeAlgorithm::Bilinear => FilterType::Triangle,
            ResizeAlgorithm::Bicubic => FilterType::CatmullRom,
            ResizeAlgorithm::Lanczos3 => FilterType::Lanczos3,
        }
    }
}
