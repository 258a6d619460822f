//! Bounding-box regression from part displacements.
//!
//! For every component, the latent positives' part displacements
//! `(1, rx₀, ry₀, rx₁, ry₁, …)` are regressed onto the ground-truth box
//! centre drift (in root cells, x and y) and the relative scale change. The
//! intercepts go to the root, the slopes to the parts.
use crate::diagnostics::{ProgressSink, TrainEvent};
use crate::error::Result;
use crate::extract::FeatureVector;
use crate::model::MixtureModel;
use crate::pyramid::WINDOW_SIZE;
use crate::solver::LeastSquares;
use crate::types::Rect;
use nalgebra::{DMatrix, DVector};

/// Regression targets `(x drift, y drift, scale drift)` of one positive.
pub fn regression_targets(v: &FeatureVector, bbox: Rect, root_rows: usize, root_cols: usize) -> [f64; 3] {
    let cell = WINDOW_SIZE as f64;
    let (bw, bh) = (bbox.width as f64, bbox.height as f64);
    let dx = (bbox.x as f64 + bw * 0.5) / (v.scale_x * cell) - v.x as f64;
    let dy = (bbox.y as f64 + bh * 0.5) / (v.scale_y * cell) - v.y as f64;
    let window = root_rows as f64 * v.scale_x * cell * root_cols as f64 * v.scale_y * cell;
    let ds = (bw * bh / window).sqrt() - 1.0;
    [dx, dy, ds]
}

/// Fit every component's regressors from `positives` (one slot per box in
/// `bboxes`). Components without positives keep their coefficients.
pub fn fit_bbox_regressors(
    model: &mut MixtureModel,
    positives: &[Option<FeatureVector>],
    bboxes: &[Rect],
    discard_constant: bool,
    solver: &dyn LeastSquares,
    sink: &mut dyn ProgressSink,
) -> Result<()> {
    for (id, root) in model.roots.iter_mut().enumerate() {
        let examples: Vec<(&FeatureVector, Rect)> = positives
            .iter()
            .zip(bboxes)
            .filter_map(|(v, &b)| v.as_ref().filter(|v| v.id == id).map(|v| (v, b)))
            .collect();
        if examples.is_empty() {
            log::warn!("component {id}: no positives for bounding-box regression");
            continue;
        }
        let dims = root.parts.len() * 2 + 1;
        let mut x = DMatrix::<f64>::zeros(examples.len(), dims);
        let mut targets = [
            DVector::<f64>::zeros(examples.len()),
            DVector::<f64>::zeros(examples.len()),
            DVector::<f64>::zeros(examples.len()),
        ];
        for (row, (v, bbox)) in examples.iter().enumerate() {
            x[(row, 0)] = 1.0;
            for (k, pv) in v.parts.iter().enumerate().take(root.parts.len()) {
                x[(row, k * 2 + 1)] = pv.dx;
                x[(row, k * 2 + 2)] = pv.dy;
            }
            let t = regression_targets(v, *bbox, root.w.rows, root.w.cols);
            for (target, value) in targets.iter_mut().zip(t) {
                target[row] = value;
            }
        }
        for (j, y) in targets.iter().enumerate() {
            let z = solver.solve(&x, y)?;
            root.alpha[j] = if discard_constant { 0.0 } else { z[0] as f32 };
            for (k, part) in root.parts.iter_mut().enumerate() {
                part.alpha[j * 2] = z[k * 2 + 1] as f32;
                part.alpha[j * 2 + 1] = z[k * 2 + 2] as f32;
            }
        }
        sink.emit(&TrainEvent::RegressionFitted {
            component: id,
            examples: examples.len(),
        });
    }
    Ok(())
}
