use super::ImageF32;

/// Borrowed 8-bit raster (gray or interleaved RGB).
#[derive(Clone, Debug)]
pub struct ImageU8<'a> {
    pub w: usize,
    pub h: usize,
    pub channels: usize,
    pub stride: usize, // bytes between rows
    pub data: &'a [u8],
}

impl<'a> ImageU8<'a> {
    /// Single-channel view over a tightly packed buffer.
    pub fn gray(w: usize, h: usize, data: &'a [u8]) -> Self {
        Self {
            w,
            h,
            channels: 1,
            stride: w,
            data,
        }
    }

    /// Interleaved RGB view over a tightly packed buffer.
    pub fn rgb(w: usize, h: usize, data: &'a [u8]) -> Self {
        Self {
            w,
            h,
            channels: 3,
            stride: w * 3,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, c: usize) -> u8 {
        self.data[y * self.stride + x * self.channels + c]
    }

    /// Widen to f32 keeping the 0..255 intensity range.
    pub fn to_f32(&self) -> ImageF32 {
        let mut out = ImageF32::with_channels(self.w, self.h, self.channels);
        let n = self.w * self.channels;
        for y in 0..self.h {
            let src = &self.data[y * self.stride..y * self.stride + n];
            let start = y * out.stride;
            for (dst, &s) in out.data[start..start + n].iter_mut().zip(src) {
                *dst = s as f32;
            }
        }
        out
    }
}
