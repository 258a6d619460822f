use dpm_detector::features::{FeatureMap, FEATURE_CHANNELS};
use dpm_detector::model::{MixtureModel, PartClassifier, RootClassifier};

/// Weights cycling through a few awkward binary fractions.
pub fn patterned_map(rows: usize, cols: usize, seed: usize) -> FeatureMap {
    let data = (0..rows * cols * FEATURE_CHANNELS)
        .map(|i| (((i + seed) % 11) as f32 - 5.0) * 0.1)
        .collect();
    FeatureMap::from_vec(rows, cols, data)
}

/// Root-only component that scores `beta` everywhere.
pub fn constant_model(rows: usize, cols: usize, beta: f32) -> MixtureModel {
    MixtureModel::new(vec![RootClassifier::new(FeatureMap::zeros(rows, cols), beta)])
}

/// Two components; the second has a mirrored pair of parts and a centred
/// part, plus non-trivial regressors.
pub fn two_component_model() -> MixtureModel {
    let mut wide = RootClassifier::new(patterned_map(3, 5, 0), -0.3);
    wide.alpha = [0.1, -0.2, 0.05];
    let mut tall = RootClassifier::new(patterned_map(5, 3, 7), 1.0 / 3.0);
    let mut left = PartClassifier::new(patterned_map(2, 2, 1), 0, 2);
    let mut right = PartClassifier::new(patterned_map(2, 2, 2), 4, 2);
    left.counterpart = Some(1);
    right.counterpart = Some(0);
    left.dx = 0.015625;
    right.dx = -0.015625;
    left.alpha = [0.1, 0.2, 0.3, -0.4, 0.5, -0.6];
    let mut centre = PartClassifier::new(patterned_map(3, 2, 3), 2, 5);
    centre.dyy = 0.7;
    tall.parts = vec![left, right, centre];
    MixtureModel::new(vec![wide, tall])
}
