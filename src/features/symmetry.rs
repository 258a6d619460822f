//! Left-right mirroring of feature maps and filters.

use super::{FeatureMap, FEATURE_CHANNELS};

/// Channel permutation under a horizontal flip.
pub const SYM_LUT: [usize; FEATURE_CHANNELS] = [
    2, 3, 0, 1, 4, 12, 11, 10, 9, 8, 7, 6, 5, 22, 21, 20, 19, 18, 17, 16, 15, 14, 13, 30, 29, 28,
    27, 26, 25, 24, 23,
];

/// Largest weight difference tolerated by [`is_symmetric`].
pub const SYMMETRY_TOLERANCE: f32 = 0.002;

impl FeatureMap {
    /// Horizontal mirror: column `x` moves to `cols - 1 - x` and channels are
    /// permuted by [`SYM_LUT`].
    pub fn mirrored(&self) -> FeatureMap {
        let mut out = FeatureMap::zeros(self.rows, self.cols);
        for y in 0..self.rows {
            for x in 0..self.cols {
                let src = self.cell(y, x);
                let dst = out.cell_mut(y, self.cols - 1 - x);
                for (c, &v) in src.iter().enumerate() {
                    dst[SYM_LUT[c]] = v;
                }
            }
        }
        out
    }
}

/// Largest disagreement between a filter and its mirror.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Asymmetry {
    pub y: usize,
    pub x: usize,
    pub channel: usize,
    pub magnitude: f32,
}

/// The worst cell/channel mismatch of `w` against its mirror, if it exceeds
/// [`SYMMETRY_TOLERANCE`].
pub fn worst_asymmetry(w: &FeatureMap) -> Option<Asymmetry> {
    let m = w.mirrored();
    let mut worst: Option<Asymmetry> = None;
    for (i, (a, b)) in w.data.iter().zip(&m.data).enumerate() {
        let magnitude = (a - b).abs();
        if magnitude <= SYMMETRY_TOLERANCE || worst.is_some_and(|w| w.magnitude >= magnitude) {
            continue;
        }
        let cell = i / FEATURE_CHANNELS;
        worst = Some(Asymmetry {
            y: cell / w.cols,
            x: cell % w.cols,
            channel: i % FEATURE_CHANNELS,
            magnitude,
        });
    }
    worst
}

/// Whether `w` equals its own mirror within [`SYMMETRY_TOLERANCE`].
pub fn is_symmetric(w: &FeatureMap) -> bool {
    worst_asymmetry(w).is_none()
}
