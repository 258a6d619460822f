//! First guess of a component's root filter from warped windows.
//!
//! With symmetry on, the classifier only sees the left `ceil(cols / 2)`
//! columns of every example plus the same columns of its mirror, and the
//! learnt half is copied onto the right through [`SYM_LUT`].
use crate::error::Result;
use crate::extract::FeatureVector;
use crate::features::{FeatureMap, FEATURE_CHANNELS, SYM_LUT};
use crate::model::RootClassifier;
use crate::solver::{LinearClassifier, LinearProblem};

fn half_row(map: &FeatureMap, half_cols: usize, mirrored: bool) -> Vec<f32> {
    let mut row = Vec::with_capacity(map.rows * half_cols * FEATURE_CHANNELS);
    for y in 0..map.rows {
        for x in 0..half_cols {
            if mirrored {
                let cell = map.cell(y, map.cols - 1 - x);
                row.extend(SYM_LUT.iter().map(|&k| cell[k]));
            } else {
                row.extend_from_slice(map.cell(y, x));
            }
        }
    }
    row
}

/// Fit component `id`'s root. `labels` / `negative_labels` assign each
/// positive / negative to a component; only those of `id` are used.
#[allow(clippy::too_many_arguments)]
pub fn initialize_root(
    solver: &dyn LinearClassifier,
    id: usize,
    shape: (usize, usize),
    positives: &[Option<FeatureVector>],
    labels: &[usize],
    negatives: &[FeatureVector],
    negative_labels: &[usize],
    c: f64,
    symmetric: bool,
) -> Result<RootClassifier> {
    let (rows, cols) = shape;
    let half_cols = (cols + 1) / 2;
    let mut problem = LinearProblem {
        rows: Vec::new(),
        labels: Vec::new(),
        bias: if symmetric { 0.5 } else { 1.0 },
    };
    let examples = positives
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l == id)
        .filter_map(|(v, _)| v.as_ref().map(|v| (v, 1.0)))
        .chain(
            negatives
                .iter()
                .zip(negative_labels)
                .filter(|(_, &l)| l == id)
                .map(|(v, _)| (v, -1.0)),
        );
    for (v, label) in examples {
        if symmetric {
            problem.rows.push(half_row(&v.root, half_cols, false));
            problem.labels.push(label);
            problem.rows.push(half_row(&v.root, half_cols, true));
            problem.labels.push(label);
        } else {
            problem.rows.push(v.root.data.clone());
            problem.labels.push(label);
        }
    }
    log::info!(
        "component {id}: fitting {rows}x{cols} root on {} examples",
        problem.rows.len()
    );
    let solution = solver.fit(&problem, c)?;

    let mut w = FeatureMap::zeros(rows, cols);
    let beta = if symmetric {
        for y in 0..rows {
            for x in 0..half_cols {
                for k in 0..FEATURE_CHANNELS {
                    let v = solution.weights[(y * half_cols + x) * FEATURE_CHANNELS + k] as f32;
                    w.cell_mut(y, x)[k] = v;
                    w.cell_mut(y, cols - 1 - x)[SYM_LUT[k]] = v;
                }
            }
        }
        solution.bias_weight * 2.0
    } else {
        for (dst, &src) in w.data.iter_mut().zip(&solution.weights) {
            *dst = src as f32;
        }
        solution.bias_weight
    };
    Ok(RootClassifier::new(w, beta as f32))
}
