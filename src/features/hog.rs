//! Histogram-of-oriented-gradients extraction.
//!
//! Gradients use clamped central differences; on colour input the channel
//! with the strongest gradient wins. Each pixel votes its magnitude into one
//! of 18 signed orientation bins of the cell containing it. Cell histograms
//! are normalised against the energy of the four 2×2 blocks touching the
//! cell, truncated at 0.2, and folded into the 31-channel layout described
//! in [`crate::features`].
use super::{FeatureMap, FEATURE_CHANNELS};
use crate::image::ImageF32;
use rayon::prelude::*;

const SIGNED_BINS: usize = 18;
const UNSIGNED_BINS: usize = 9;
const TRUNCATION: f32 = 0.2;
const NORM_EPS: f32 = 1e-4;
const TEXTURE_WEIGHT: f32 = 0.2357;

/// Unit vectors of the unsigned orientations, 20° apart.
fn orientations() -> [(f32, f32); UNSIGNED_BINS] {
    let mut out = [(0.0, 0.0); UNSIGNED_BINS];
    for (o, uv) in out.iter_mut().enumerate() {
        let theta = o as f32 * std::f32::consts::PI / UNSIGNED_BINS as f32;
        *uv = (theta.cos(), theta.sin());
    }
    out
}

#[inline]
fn sample(img: &ImageF32, x: isize, y: isize, c: usize) -> f32 {
    let x = x.clamp(0, img.w as isize - 1) as usize;
    let y = y.clamp(0, img.h as isize - 1) as usize;
    img.get_c(x, y, c)
}

/// HOG map of `image` with square cells of `cell` pixels. The map has
/// `h / cell` rows and `w / cell` columns; trailing pixels are ignored.
pub fn hog(image: &ImageF32, cell: usize) -> FeatureMap {
    let rows = image.h / cell.max(1);
    let cols = image.w / cell.max(1);
    if rows == 0 || cols == 0 {
        return FeatureMap::zeros(rows, cols);
    }
    let dirs = orientations();

    let hist: Vec<f32> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|cy| {
            let mut row_hist = vec![0.0f32; cols * SIGNED_BINS];
            for py in cy * cell..(cy + 1) * cell {
                for px in 0..cols * cell {
                    let (x, y) = (px as isize, py as isize);
                    let (mut gx, mut gy, mut best) = (0.0f32, 0.0f32, -1.0f32);
                    for c in 0..image.channels {
                        let dx = sample(image, x + 1, y, c) - sample(image, x - 1, y, c);
                        let dy = sample(image, x, y + 1, c) - sample(image, x, y - 1, c);
                        let mag2 = dx * dx + dy * dy;
                        if mag2 > best {
                            best = mag2;
                            gx = dx;
                            gy = dy;
                        }
                    }
                    if best <= 0.0 {
                        continue;
                    }
                    let mut bin = 0;
                    let mut best_dot = 0.0f32;
                    for (o, &(u, v)) in dirs.iter().enumerate() {
                        let dot = u * gx + v * gy;
                        if dot > best_dot {
                            best_dot = dot;
                            bin = o;
                        } else if -dot > best_dot {
                            best_dot = -dot;
                            bin = o + UNSIGNED_BINS;
                        }
                    }
                    row_hist[(px / cell) * SIGNED_BINS + bin] += best.sqrt();
                }
            }
            row_hist
        })
        .collect();

    let energy: Vec<f32> = hist
        .chunks_exact(SIGNED_BINS)
        .map(|h| {
            (0..UNSIGNED_BINS)
                .map(|o| {
                    let s = h[o] + h[o + UNSIGNED_BINS];
                    s * s
                })
                .sum()
        })
        .collect();

    let mut map = FeatureMap::zeros(rows, cols);
    map.data
        .par_chunks_mut(cols * FEATURE_CHANNELS)
        .enumerate()
        .for_each(|(y, out_row)| {
            let e = |yy: usize, xx: usize| energy[yy * cols + xx];
            let (yp, yn) = (y.saturating_sub(1), (y + 1).min(rows - 1));
            for x in 0..cols {
                let (xp, xn) = (x.saturating_sub(1), (x + 1).min(cols - 1));
                // top-left, bottom-left, top-right, bottom-right blocks
                let blocks = [
                    e(yp, xp) + e(yp, x) + e(y, xp) + e(y, x),
                    e(y, xp) + e(y, x) + e(yn, xp) + e(yn, x),
                    e(yp, x) + e(yp, xn) + e(y, x) + e(y, xn),
                    e(y, x) + e(y, xn) + e(yn, x) + e(yn, xn),
                ];
                let inv = blocks.map(|n| 1.0 / (n + NORM_EPS).sqrt());
                let h = &hist[(y * cols + x) * SIGNED_BINS..(y * cols + x + 1) * SIGNED_BINS];
                let f = &mut out_row[x * FEATURE_CHANNELS..(x + 1) * FEATURE_CHANNELS];

                for o in 0..SIGNED_BINS {
                    let mut sum = 0.0;
                    for (b, &n) in inv.iter().enumerate() {
                        let v = (h[o] * n).min(TRUNCATION);
                        sum += 0.5 * v;
                        f[b] += TEXTURE_WEIGHT * v;
                    }
                    f[4 + UNSIGNED_BINS + o] = sum;
                }
                for o in 0..UNSIGNED_BINS {
                    let s = h[o] + h[o + UNSIGNED_BINS];
                    f[4 + o] = inv.iter().map(|&n| 0.5 * (s * n).min(TRUNCATION)).sum();
                }
            }
        });
    map
}
