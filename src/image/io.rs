//! I/O helpers for images and JSON.
//!
//! - `load_image`: decode a PNG/JPEG/etc. into an `ImageF32` (gray or RGB,
//!   intensities in `0..=255`).
//! - `write_json_file`: pretty-print a serializable value to disk.
use super::{ImageF32, ImageU8};
use crate::error::{DpmError, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load an image from disk, optionally collapsing it to one channel.
pub fn load_image(path: &Path, grayscale: bool) -> Result<ImageF32> {
    let img = image::open(path).map_err(|source| DpmError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let image = if grayscale {
        ImageU8::gray(w, h, &img.into_luma8().into_raw()).to_f32()
    } else {
        ImageU8::rgb(w, h, &img.into_rgb8().into_raw()).to_f32()
    };
    Ok(image)
}

/// Serialize a value as pretty JSON to `path`, creating parent directories.
pub fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value).map_err(|source| DpmError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(|e| DpmError::io(path, e))
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| DpmError::io(parent, e))?;
        }
    }
    Ok(())
}
