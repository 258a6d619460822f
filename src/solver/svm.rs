//! L2-regularised L1-loss linear SVM solved in the dual by coordinate
//! descent.
//!
//! Minimises `½‖w‖² + C Σ max(0, 1 - yᵢ w·xᵢ)` where every row is augmented
//! with a constant bias feature. The dual variables are visited in a fresh
//! random order each sweep until the projected-gradient spread drops below
//! `eps`.
use crate::error::{DpmError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Labelled rows for a linear classifier.
#[derive(Clone, Debug, Default)]
pub struct LinearProblem {
    pub rows: Vec<Vec<f32>>,
    /// `+1` or `-1` per row.
    pub labels: Vec<f64>,
    /// Value of the constant feature appended to every row.
    pub bias: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinearSolution {
    pub weights: Vec<f64>,
    /// Weight of the constant feature.
    pub bias_weight: f64,
}

pub trait LinearClassifier {
    fn fit(&self, problem: &LinearProblem, c: f64) -> Result<LinearSolution>;
}

#[derive(Clone, Debug)]
pub struct DualCoordinateSvm {
    pub eps: f64,
    pub max_iter: usize,
    pub seed: u64,
}

impl Default for DualCoordinateSvm {
    fn default() -> Self {
        Self {
            eps: 0.1,
            max_iter: 1000,
            seed: 0,
        }
    }
}

impl LinearClassifier for DualCoordinateSvm {
    fn fit(&self, problem: &LinearProblem, c: f64) -> Result<LinearSolution> {
        let n = problem.rows.len();
        if n == 0 || problem.labels.len() != n {
            return Err(DpmError::invalid(
                "problem",
                format!("{} rows with {} labels", n, problem.labels.len()),
            ));
        }
        let dim = problem.rows[0].len();
        if problem.rows.iter().any(|r| r.len() != dim) {
            return Err(DpmError::invalid("problem", "rows differ in length"));
        }
        let bias = problem.bias;
        let mut w = vec![0.0f64; dim];
        let mut wb = 0.0f64;
        let mut alpha = vec![0.0f64; n];
        let qd: Vec<f64> = problem
            .rows
            .iter()
            .map(|r| r.iter().map(|&v| v as f64 * v as f64).sum::<f64>() + bias * bias)
            .collect();
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut iter = 0;
        while iter < self.max_iter {
            order.shuffle(&mut rng);
            let mut pg_max = f64::NEG_INFINITY;
            let mut pg_min = f64::INFINITY;
            for &i in &order {
                let x = &problem.rows[i];
                let y = problem.labels[i];
                let dot: f64 = w.iter().zip(x).map(|(a, &b)| a * b as f64).sum::<f64>() + wb * bias;
                let g = y * dot - 1.0;
                let pg = if alpha[i] == 0.0 {
                    g.min(0.0)
                } else if alpha[i] == c {
                    g.max(0.0)
                } else {
                    g
                };
                pg_max = pg_max.max(pg);
                pg_min = pg_min.min(pg);
                if pg.abs() > 1e-12 && qd[i] > 0.0 {
                    let old = alpha[i];
                    alpha[i] = (old - g / qd[i]).clamp(0.0, c);
                    let d = (alpha[i] - old) * y;
                    for (wj, &xj) in w.iter_mut().zip(x) {
                        *wj += d * xj as f64;
                    }
                    wb += d * bias;
                }
            }
            iter += 1;
            if pg_max - pg_min <= self.eps {
                break;
            }
        }
        if iter >= self.max_iter {
            log::warn!("DualCoordinateSvm: reached {} sweeps without converging", self.max_iter);
        }
        Ok(LinearSolution {
            weights: w,
            bias_weight: wb,
        })
    }
}
