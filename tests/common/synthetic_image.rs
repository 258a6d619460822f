use dpm_detector::error::{DpmError, Result};
use dpm_detector::image::ImageF32;
use dpm_detector::train::ImageSource;
use dpm_detector::types::Rect;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Flat gray image with a bright axis-aligned square.
pub fn bright_square(width: usize, height: usize, square: Rect) -> ImageF32 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    let mut img = ImageF32::new(width, height);
    for y in 0..height as i32 {
        for x in 0..width as i32 {
            let inside = x >= square.x
                && x < square.x + square.width
                && y >= square.y
                && y < square.y + square.height;
            img.set(x as usize, y as usize, if inside { 220.0 } else { 32.0 });
        }
    }
    img
}

/// Deterministic noise in `[0, 255)` from a linear congruential sequence.
pub fn noise(width: usize, height: usize, seed: u32) -> ImageF32 {
    let mut state = seed.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let data = (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 24) as f32
        })
        .collect();
    ImageF32::from_vec(width, height, 1, data)
}

/// Noisy background with a dark rim and bright core painted over `bbox`:
/// a crude stand-in for an object of a fixed appearance.
pub fn object_on_noise(width: usize, height: usize, bbox: Rect, seed: u32) -> ImageF32 {
    let mut img = noise(width, height, seed);
    for y in bbox.y.max(0)..(bbox.y + bbox.height).min(height as i32) {
        for x in bbox.x.max(0)..(bbox.x + bbox.width).min(width as i32) {
            let (dx, dy) = (x - bbox.x, y - bbox.y);
            let rim = dx < 4 || dy < 4 || dx >= bbox.width - 4 || dy >= bbox.height - 4;
            img.set(x as usize, y as usize, if rim { 10.0 } else { 240.0 });
        }
    }
    img
}

/// Images served from memory, keyed by path.
#[derive(Default)]
pub struct MemoryImages {
    images: HashMap<PathBuf, ImageF32>,
}

impl MemoryImages {
    pub fn insert(&mut self, path: impl Into<PathBuf>, image: ImageF32) {
        self.images.insert(path.into(), image);
    }
}

impl ImageSource for MemoryImages {
    fn load(&self, path: &Path, grayscale: bool) -> Result<ImageF32> {
        let image = self.images.get(path).ok_or_else(|| DpmError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        Ok(if grayscale { image.to_gray() } else { image.clone() })
    }
}
