//! Resampling primitives over channel-interleaved f32 rasters.
//!
//! - `resample_area`: box-coverage resampling to an arbitrary size.
//! - `sample_down`: 5-tap Gaussian then 2× decimation (`w / 2`, `h / 2`).
//! - `sample_up`: 2× enlargement with `3/4, 1/4` interpolation.
//! - `slice`: copy a window, zero-filling anything outside the source.
//!
//! Borders clamp to the image extents throughout. The `*_raw` variants work
//! on bare buffers so feature maps can share them.
use super::ImageF32;

/// Normalised 5-tap Gaussian `[1, 4, 6, 4, 1] / 16`.
pub const GAUSSIAN_5TAP: [f32; 5] = [0.0625, 0.25, 0.375, 0.25, 0.0625];

/// Resample `src` to `new_w × new_h`, each output pixel averaging the source
/// area it covers.
pub fn resample_area(src: &ImageF32, new_w: usize, new_h: usize) -> ImageF32 {
    let data = resample_area_raw(&src.data, src.w, src.h, src.channels, new_w, new_h);
    ImageF32::from_vec(new_w, new_h, src.channels, data)
}

pub fn sample_down(src: &ImageF32) -> ImageF32 {
    let (w, h, data) = sample_down_raw(&src.data, src.w, src.h, src.channels);
    ImageF32::from_vec(w, h, src.channels, data)
}

pub fn sample_up(src: &ImageF32) -> ImageF32 {
    let data = sample_up_raw(&src.data, src.w, src.h, src.channels);
    ImageF32::from_vec(src.w * 2, src.h * 2, src.channels, data)
}

/// Copy the `w × h` window whose top-left corner is `(x, y)`.
pub fn slice(src: &ImageF32, x: i64, y: i64, w: usize, h: usize) -> ImageF32 {
    let c = src.channels;
    let mut out = ImageF32::with_channels(w, h, c);
    for oy in 0..h {
        let sy = y + oy as i64;
        if sy < 0 || sy >= src.h as i64 {
            continue;
        }
        let x0 = x.max(0);
        let x1 = (x + w as i64).min(src.w as i64);
        if x1 <= x0 {
            continue;
        }
        let src_start = src.idx(x0 as usize, sy as usize);
        let dst_start = out.idx((x0 - x) as usize, oy);
        let n = (x1 - x0) as usize * c;
        out.data[dst_start..dst_start + n].copy_from_slice(&src.data[src_start..src_start + n]);
    }
    out
}

/// Per-output-index list of `(source index, weight)` covering `[o * r, (o + 1) * r)`.
fn coverage_table(src_len: usize, dst_len: usize) -> Vec<Vec<(usize, f32)>> {
    let ratio = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|o| {
            let start = o as f64 * ratio;
            let end = start + ratio;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len);
            let mut taps = Vec::with_capacity(last.saturating_sub(first));
            for s in first..last {
                let lo = start.max(s as f64);
                let hi = end.min(s as f64 + 1.0);
                if hi > lo {
                    taps.push((s, ((hi - lo) / ratio) as f32));
                }
            }
            taps
        })
        .collect()
}

pub(crate) fn resample_area_raw(
    data: &[f32],
    w: usize,
    h: usize,
    c: usize,
    new_w: usize,
    new_h: usize,
) -> Vec<f32> {
    if new_w == 0 || new_h == 0 || w == 0 || h == 0 {
        return vec![0.0; new_w * new_h * c];
    }
    let xs = coverage_table(w, new_w);
    let ys = coverage_table(h, new_h);

    // horizontal pass: h × new_w
    let mut tmp = vec![0.0f32; h * new_w * c];
    for y in 0..h {
        let src_row = &data[y * w * c..(y + 1) * w * c];
        let dst_row = &mut tmp[y * new_w * c..(y + 1) * new_w * c];
        for (ox, taps) in xs.iter().enumerate() {
            let dst = &mut dst_row[ox * c..(ox + 1) * c];
            for &(sx, wt) in taps {
                for (d, s) in dst.iter_mut().zip(&src_row[sx * c..(sx + 1) * c]) {
                    *d += s * wt;
                }
            }
        }
    }

    let mut out = vec![0.0f32; new_h * new_w * c];
    let row_len = new_w * c;
    for (oy, taps) in ys.iter().enumerate() {
        let dst_row = &mut out[oy * row_len..(oy + 1) * row_len];
        for &(sy, wt) in taps {
            let src_row = &tmp[sy * row_len..(sy + 1) * row_len];
            for (d, s) in dst_row.iter_mut().zip(src_row) {
                *d += s * wt;
            }
        }
    }
    out
}

pub(crate) fn sample_down_raw(data: &[f32], w: usize, h: usize, c: usize) -> (usize, usize, Vec<f32>) {
    let (nw, nh) = (w / 2, h / 2);
    if nw == 0 || nh == 0 {
        return (nw, nh, Vec::new());
    }
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;

    // horizontal blur at even columns only: h × nw
    let mut tmp = vec![0.0f32; h * nw * c];
    for y in 0..h {
        for ox in 0..nw {
            let cx = (ox * 2) as isize;
            for (k, &tap) in GAUSSIAN_5TAP.iter().enumerate() {
                let sx = clamp(cx + k as isize - 2, w);
                let src = (y * w + sx) * c;
                let dst = (y * nw + ox) * c;
                for ch in 0..c {
                    tmp[dst + ch] += tap * data[src + ch];
                }
            }
        }
    }

    let mut out = vec![0.0f32; nh * nw * c];
    for oy in 0..nh {
        let cy = (oy * 2) as isize;
        for (k, &tap) in GAUSSIAN_5TAP.iter().enumerate() {
            let sy = clamp(cy + k as isize - 2, h);
            let src_row = &tmp[sy * nw * c..(sy + 1) * nw * c];
            let dst_row = &mut out[oy * nw * c..(oy + 1) * nw * c];
            for (d, s) in dst_row.iter_mut().zip(src_row) {
                *d += tap * s;
            }
        }
    }
    (nw, nh, out)
}

pub(crate) fn sample_up_raw(data: &[f32], w: usize, h: usize, c: usize) -> Vec<f32> {
    let (nw, nh) = (w * 2, h * 2);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    // Output index 2i leans on i - 1, 2i + 1 leans on i + 1.
    let neighbour = |o: usize, len: usize| -> (usize, usize) {
        let i = o / 2;
        let j = if o % 2 == 0 {
            i.saturating_sub(1)
        } else {
            (i + 1).min(len - 1)
        };
        (i, j)
    };

    let mut tmp = vec![0.0f32; h * nw * c];
    for y in 0..h {
        for ox in 0..nw {
            let (i, j) = neighbour(ox, w);
            for ch in 0..c {
                tmp[(y * nw + ox) * c + ch] =
                    0.75 * data[(y * w + i) * c + ch] + 0.25 * data[(y * w + j) * c + ch];
            }
        }
    }

    let mut out = vec![0.0f32; nh * nw * c];
    let row_len = nw * c;
    for oy in 0..nh {
        let (i, j) = neighbour(oy, h);
        let (ri, rj) = (&tmp[i * row_len..(i + 1) * row_len], &tmp[j * row_len..(j + 1) * row_len]);
        let dst = &mut out[oy * row_len..(oy + 1) * row_len];
        for ((d, a), b) in dst.iter_mut().zip(ri).zip(rj) {
            *d = 0.75 * a + 0.25 * b;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> ImageF32 {
        let data = (0..w * h).map(|i| (i % w) as f32 + 10.0 * (i / w) as f32).collect();
        ImageF32::from_vec(w, h, 1, data)
    }

    #[test]
    fn area_resample_preserves_constant_images() {
        let img = ImageF32::from_vec(7, 5, 2, vec![3.5; 70]);
        let out = resample_area(&img, 4, 3);
        assert_eq!((out.w, out.h, out.channels), (4, 3, 2));
        for v in &out.data {
            assert!((v - 3.5).abs() < 1e-4, "value {v}");
        }
    }

    #[test]
    fn area_resample_halving_averages_pairs() {
        let img = ramp(4, 2);
        let out = resample_area(&img, 2, 1);
        // mean of (0,1,10,11) and (2,3,12,13)
        assert!((out.get(0, 0) - 5.5).abs() < 1e-5);
        assert!((out.get(1, 0) - 7.5).abs() < 1e-5);
    }

    #[test]
    fn sample_down_halves_and_keeps_flat_fields() {
        let img = ImageF32::from_vec(9, 6, 1, vec![2.0; 54]);
        let out = sample_down(&img);
        assert_eq!((out.w, out.h), (4, 3));
        assert!(out.data.iter().all(|v| (v - 2.0).abs() < 1e-5));
    }

    #[test]
    fn sample_up_doubles_size() {
        let img = ramp(3, 2);
        let out = sample_up(&img);
        assert_eq!((out.w, out.h), (6, 4));
        // x = 1 sits between source columns 0 and 1
        let expected = 0.75 * 0.0 + 0.25 * 1.0;
        assert!((out.get(1, 0) - expected).abs() < 1e-5);
    }

    #[test]
    fn slice_zero_fills_outside() {
        let img = ramp(3, 3);
        let out = slice(&img, -1, 1, 3, 3);
        assert_eq!(out.get(0, 0), 0.0);
        assert_eq!(out.get(1, 0), img.get(0, 1));
        assert_eq!(out.get(2, 1), img.get(1, 2));
        assert_eq!(out.get(1, 2), 0.0);
    }
}
