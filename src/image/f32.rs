//! Owned f32 raster, row-major with interleaved channels.
//!
//! Images enter the pipeline with intensities in `0..=255` (gray or RGB).
//! Single-channel instances also carry filter responses and distance
//! transform outputs, where `w` is the column count and `h` the row count.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageF32 {
    /// Image width in pixels
    pub w: usize,
    /// Image height in pixels
    pub h: usize,
    /// Interleaved samples per pixel
    pub channels: usize,
    /// Number of f32 elements between consecutive rows (`w * channels`)
    pub stride: usize,
    /// Backing storage in row-major order
    pub data: Vec<f32>,
}

impl ImageF32 {
    /// Zero-initialized single-channel buffer of size `w × h`.
    pub fn new(w: usize, h: usize) -> Self {
        Self::with_channels(w, h, 1)
    }

    /// Zero-initialized buffer with `channels` interleaved samples per pixel.
    pub fn with_channels(w: usize, h: usize, channels: usize) -> Self {
        Self {
            w,
            h,
            channels,
            stride: w * channels,
            data: vec![0.0; w * h * channels],
        }
    }

    /// Wrap an existing buffer; `data.len()` must be `w * h * channels`.
    pub fn from_vec(w: usize, h: usize, channels: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), w * h * channels, "buffer size mismatch");
        Self {
            w,
            h,
            channels,
            stride: w * channels,
            data,
        }
    }

    #[inline]
    /// Convert (x, y) to the linear index of the pixel's first channel.
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.stride + x * self.channels
    }
    #[inline]
    /// Get channel 0 at (x, y).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[self.idx(x, y)]
    }
    #[inline]
    pub fn get_c(&self, x: usize, y: usize, c: usize) -> f32 {
        self.data[self.idx(x, y) + c]
    }
    #[inline]
    /// Set channel 0 at (x, y).
    pub fn set(&mut self, x: usize, y: usize, v: f32) {
        let i = self.idx(x, y);
        self.data[i] = v;
    }
    #[inline]
    pub fn set_c(&mut self, x: usize, y: usize, c: usize, v: f32) {
        let i = self.idx(x, y) + c;
        self.data[i] = v;
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Average the channels into a single-channel image.
    pub fn to_gray(&self) -> ImageF32 {
        if self.channels == 1 {
            return self.clone();
        }
        let mut out = ImageF32::new(self.w, self.h);
        let inv = 1.0 / self.channels as f32;
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks_exact(self.channels)) {
            *dst = px.iter().sum::<f32>() * inv;
        }
        out
    }

    /// Left-right mirror.
    pub fn flip_horizontal(&self) -> ImageF32 {
        let mut out = ImageF32::with_channels(self.w, self.h, self.channels);
        let c = self.channels;
        for y in 0..self.h {
            for x in 0..self.w {
                let src = self.idx(x, y);
                let dst = out.idx(self.w - 1 - x, y);
                out.data[dst..dst + c].copy_from_slice(&self.data[src..src + c]);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_reverses_pixels_but_not_channels() {
        let img = ImageF32::from_vec(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]);
        let flipped = img.flip_horizontal();
        assert_eq!(flipped.data, vec![3.0, 4.0, 1.0, 2.0]);
    }

    #[test]
    fn gray_is_channel_mean() {
        let img = ImageF32::from_vec(1, 1, 3, vec![3.0, 6.0, 9.0]);
        assert!((img.to_gray().get(0, 0) - 6.0).abs() < 1e-6);
    }
}
