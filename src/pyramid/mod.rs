//! HOG feature pyramid.
//!
//! With `next = interval + 1` octave steps and `scale = 2^(1 / next)`, the
//! pyramid holds `scale_upto + 2 * next` levels:
//!
//! - levels `next .. 2 * next` are the input resampled by `scale^-k`,
//!   `k = 0 .. interval`, with 8-pixel cells;
//! - each further level halves the image `next` levels above it;
//! - levels `0 .. next` reuse the images of levels `next .. 2 * next` with
//!   4-pixel cells, i.e. one octave finer than their partners.
//!
//! Level `i >= next` is scanned for roots; level `i - next` is where its
//! parts are evaluated.

use crate::features::{hog, FeatureMap};
use crate::image::resample::{resample_area, sample_down};
use crate::image::ImageF32;
use crate::model::MixtureModel;
use rayon::prelude::*;
use std::ops::Range;

/// Pixels per HOG cell at root resolution.
pub const WINDOW_SIZE: usize = 8;

/// Step between consecutive pyramid levels.
pub fn level_scale(interval: usize) -> f64 {
    2f64.powf(1.0 / (interval as f64 + 1.0))
}

/// Number of octave-halving steps the image affords before the smallest
/// initialised root filter of `models` no longer fits. Negative when the
/// image is too small to scan at all.
pub fn scale_upto(image: &ImageF32, models: &[&MixtureModel], interval: usize) -> i32 {
    let next = interval as i32 + 1;
    let (mut min_w, mut min_h) = (image.w, image.h);
    for model in models {
        for root in model.roots.iter().filter(|r| r.is_initialized()) {
            min_w = min_w.min(root.w.cols * WINDOW_SIZE);
            min_h = min_h.min(root.w.rows * WINDOW_SIZE);
        }
    }
    if min_w == 0 || min_h == 0 {
        return -next - 1;
    }
    let hr = image.h / min_h;
    let wr = image.w / min_w;
    let fit = hr.min(wr);
    if fit == 0 {
        return -next - 1;
    }
    ((fit as f64).ln() / level_scale(interval).ln()) as i32 - next
}

#[derive(Clone, Debug)]
pub struct FeaturePyramid {
    pub levels: Vec<FeatureMap>,
    pub interval: usize,
    pub scale: f64,
}

impl FeaturePyramid {
    /// Build the pyramid for a non-negative `scale_upto`.
    pub fn build(image: &ImageF32, interval: usize, scale_upto: usize) -> Self {
        let next = interval + 1;
        let scale = level_scale(interval);
        let count = scale_upto + next * 2;

        let mut images: Vec<ImageF32> = Vec::with_capacity(count - next);
        images.push(image.clone());
        for i in 1..=interval {
            let f = scale.powi(i as i32);
            let h = (image.h as f64 / f) as usize;
            let w = (image.w as f64 / f) as usize;
            images.push(resample_area(image, w, h));
        }
        for i in 0..scale_upto {
            let down = sample_down(&images[i]);
            images.push(down);
        }
        debug_assert_eq!(images.len(), count - next);

        // fine levels from the first octave, then one map per image
        let levels: Vec<FeatureMap> = (0..count)
            .into_par_iter()
            .map(|i| {
                if i < next {
                    hog(&images[i], WINDOW_SIZE / 2)
                } else {
                    hog(&images[i - next], WINDOW_SIZE)
                }
            })
            .collect();

        log::trace!(
            "FeaturePyramid::build levels={} interval={} base={}x{}",
            levels.len(),
            interval,
            image.w,
            image.h
        );
        Self {
            levels,
            interval,
            scale,
        }
    }

    pub fn next(&self) -> usize {
        self.interval + 1
    }

    /// Levels scanned for roots.
    pub fn root_levels(&self) -> Range<usize> {
        self.next()..self.levels.len()
    }

    /// Root level `i` and its part level one octave finer.
    pub fn level_pair(&self, i: usize) -> (&FeatureMap, &FeatureMap) {
        (&self.levels[i], &self.levels[i - self.next()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureMap;
    use crate::model::RootClassifier;

    fn model_with_root(rows: usize, cols: usize) -> MixtureModel {
        MixtureModel::new(vec![RootClassifier::new(FeatureMap::zeros(rows, cols), 0.0)])
    }

    #[test]
    fn tiny_image_is_too_small() {
        let model = model_with_root(12, 12);
        let img = ImageF32::new(16, 16);
        assert!(scale_upto(&img, &[&model], 8) < 0);
    }

    #[test]
    fn scale_upto_counts_octave_steps() {
        let model = model_with_root(4, 4);
        // 32px windows, 10 fit: log2(10) * 6 levels per octave, minus next
        let img = ImageF32::new(320, 320);
        assert_eq!(scale_upto(&img, &[&model], 5), 19 - 6);
        // the smallest root of all models decides
        let bigger = model_with_root(8, 8);
        assert_eq!(scale_upto(&img, &[&bigger, &model], 5), 13);
    }

    #[test]
    fn empty_roots_do_not_shrink_the_scan() {
        let mut model = model_with_root(4, 4);
        model.roots.push(RootClassifier::default());
        let img = ImageF32::new(320, 320);
        assert_eq!(scale_upto(&img, &[&model], 5), 13);
    }

    #[test]
    fn pyramid_layout() {
        let img = ImageF32::new(128, 96);
        let pyr = FeaturePyramid::build(&img, 3, 2);
        assert_eq!(pyr.levels.len(), 2 + 8);
        assert_eq!(pyr.root_levels(), 4..10);
        // level next is the input at 8px cells, level 0 the same image at 4px
        assert_eq!((pyr.levels[4].rows, pyr.levels[4].cols), (12, 16));
        assert_eq!((pyr.levels[0].rows, pyr.levels[0].cols), (24, 32));
        // level 2 * next halves level next
        assert_eq!((pyr.levels[8].rows, pyr.levels[8].cols), (6, 8));
        let (root, parts) = pyr.level_pair(8);
        assert_eq!((root.rows * 2, root.cols * 2), (parts.rows, parts.cols));
    }
}
