//! Filter responses: dot product of a weight map with every window of a
//! feature map.
use crate::features::{FeatureMap, FEATURE_CHANNELS};
use crate::image::ImageF32;
use rayon::prelude::*;

use super::Window;

/// Response of filter `w` over `map`.
///
/// The output has the map's shape. The value at `(y, x)` scores the window
/// whose top-left cell is `(y - half_rows, x - half_cols)`; positions where
/// that window does not fit stay zero.
pub fn filter(map: &FeatureMap, w: &FeatureMap) -> ImageF32 {
    let mut out = ImageF32::new(map.cols, map.rows);
    let win = Window::of(w);
    let ys = win.row_range(map.rows);
    let xs = win.col_range(map.cols);
    if ys.is_empty() || xs.is_empty() {
        return out;
    }
    let span = w.cols * FEATURE_CHANNELS;
    out.data
        .par_chunks_mut(map.cols)
        .enumerate()
        .filter(|(y, _)| ys.contains(y))
        .for_each(|(y, out_row)| {
            let top = y - win.half_rows;
            for x in xs.clone() {
                let left = (x - win.half_cols) * FEATURE_CHANNELS;
                let mut sum = 0.0f32;
                for fy in 0..w.rows {
                    let src = &map.row(top + fy)[left..left + span];
                    let wrow = w.row(fy);
                    sum += src.iter().zip(wrow).map(|(a, b)| a * b).sum::<f32>();
                }
                out_row[x] = sum;
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_is_windowed_dot_product() {
        let map = FeatureMap::from_vec(
            4,
            5,
            (0..20 * FEATURE_CHANNELS).map(|i| (i % 17) as f32 * 0.1).collect(),
        );
        let w = FeatureMap::from_vec(
            2,
            3,
            (0..6 * FEATURE_CHANNELS).map(|i| (i % 5) as f32 - 2.0).collect(),
        );
        let resp = filter(&map, &w);
        // half_rows = 0, half_cols = 1, tail_rows = 1, tail_cols = 1
        for y in 0..4 {
            for x in 0..5 {
                let valid = y < 3 && (1..4).contains(&x);
                let expected = if valid {
                    map.window(y as i64, x as i64 - 1, 2, 3).dot(&w) as f32
                } else {
                    0.0
                };
                assert!(
                    (resp.get(x, y) - expected).abs() < 1e-3,
                    "({x},{y}): {} vs {expected}",
                    resp.get(x, y)
                );
            }
        }
    }

    #[test]
    fn filter_larger_than_map_gives_zero_response() {
        let map = FeatureMap::zeros(2, 2);
        let w = FeatureMap::from_vec(3, 3, vec![1.0; 9 * FEATURE_CHANNELS]);
        let resp = filter(&map, &w);
        assert_eq!((resp.w, resp.h), (2, 2));
        assert!(resp.data.iter().all(|&v| v == 0.0));
    }
}
