use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};

/// The single drawing surface, sized once from the device profile.
#[derive(Debug, Clone)]
pub struct Canvas {
    handle: String,
    pixels: RgbaImage,
    drawn: Option<usize>,
}

impl Canvas {
    pub fn new(handle: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            handle: handle.into(),
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            drawn: None,
        }
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Index of the frame currently on the canvas.
    pub fn drawn(&self) -> Option<usize> {
        self.drawn
    }

    /// Copy `frame` over the canvas at the origin. Pixels are replaced, not
    /// blended; anything outside the frame keeps its previous value.
    pub fn draw(&mut self, index: usize, frame: &RgbaImage) {
        image::imageops::replace(&mut self.pixels, frame, 0, 0);
        self.drawn = Some(index);
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.pixels
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("failed to write canvas {} to {}", self.handle, path.display()))
    }
}
