use super::FEATURE_CHANNELS;
use crate::image::resample::sample_up_raw;

/// Dense `rows × cols` grid of HOG cells, [`FEATURE_CHANNELS`] values each.
///
/// Also used for filter weights; an empty map (`rows == 0 || cols == 0`)
/// stands for "no filter yet".
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMap {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl FeatureMap {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols * FEATURE_CHANNELS],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Self {
        assert_eq!(
            data.len(),
            rows * cols * FEATURE_CHANNELS,
            "feature map buffer size mismatch"
        );
        Self { rows, cols, data }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Number of scalar weights.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn cell(&self, y: usize, x: usize) -> &[f32] {
        let i = (y * self.cols + x) * FEATURE_CHANNELS;
        &self.data[i..i + FEATURE_CHANNELS]
    }

    #[inline]
    pub fn cell_mut(&mut self, y: usize, x: usize) -> &mut [f32] {
        let i = (y * self.cols + x) * FEATURE_CHANNELS;
        &mut self.data[i..i + FEATURE_CHANNELS]
    }

    /// All channels of row `y`.
    #[inline]
    pub fn row(&self, y: usize) -> &[f32] {
        let n = self.cols * FEATURE_CHANNELS;
        &self.data[y * n..(y + 1) * n]
    }

    /// Copy the `rows × cols` window with top-left cell `(y, x)`; cells
    /// falling outside the map stay zero.
    pub fn window(&self, y: i64, x: i64, rows: usize, cols: usize) -> FeatureMap {
        let mut out = FeatureMap::zeros(rows, cols);
        let y0 = y.max(0);
        let y1 = (y + rows as i64).min(self.rows as i64);
        let x0 = x.max(0);
        let x1 = (x + cols as i64).min(self.cols as i64);
        if y1 <= y0 || x1 <= x0 {
            return out;
        }
        let n = (x1 - x0) as usize * FEATURE_CHANNELS;
        for sy in y0..y1 {
            let src = (sy as usize * self.cols + x0 as usize) * FEATURE_CHANNELS;
            let dst = ((sy - y) as usize * cols + (x0 - x) as usize) * FEATURE_CHANNELS;
            out.data[dst..dst + n].copy_from_slice(&self.data[src..src + n]);
        }
        out
    }

    /// Zero a rectangular block of cells (clipped to the map).
    pub fn zero_region(&mut self, y: usize, x: usize, rows: usize, cols: usize) {
        let y1 = (y + rows).min(self.rows);
        let x1 = (x + cols).min(self.cols);
        for yy in y..y1 {
            for xx in x..x1 {
                self.cell_mut(yy, xx).fill(0.0);
            }
        }
    }

    /// 2× enlargement used to seed part filters from a root filter.
    pub fn sample_up(&self) -> FeatureMap {
        if self.is_empty() {
            return FeatureMap::zeros(self.rows * 2, self.cols * 2);
        }
        let data = sample_up_raw(&self.data, self.cols, self.rows, FEATURE_CHANNELS);
        FeatureMap::from_vec(self.rows * 2, self.cols * 2, data)
    }

    pub fn abs_sum(&self) -> f64 {
        self.data.iter().map(|v| v.abs() as f64).sum()
    }

    /// Dot product with a map of identical shape.
    pub fn dot(&self, other: &FeatureMap) -> f64 {
        debug_assert_eq!(self.data.len(), other.data.len());
        self.data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum()
    }

    /// `self += scale * other`, accumulated in f64 and stored as f32.
    pub fn add_scaled(&mut self, other: &FeatureMap, scale: f64) {
        debug_assert_eq!(self.data.len(), other.data.len());
        for (w, &v) in self.data.iter_mut().zip(&other.data) {
            *w = (*w as f64 + scale * v as f64) as f32;
        }
    }

    /// `self *= factor`.
    pub fn scale(&mut self, factor: f64) {
        for w in &mut self.data {
            *w = (*w as f64 * factor) as f32;
        }
    }
}
