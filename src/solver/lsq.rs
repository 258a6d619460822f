//! Linear least squares.
use crate::error::{DpmError, Result};
use nalgebra::{DMatrix, DVector};

pub trait LeastSquares {
    /// Minimise `‖X z - y‖²` over `z`.
    fn solve(&self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>>;
}

/// SVD-based solver; rank-deficient systems get the minimum-norm solution.
#[derive(Clone, Copy, Debug)]
pub struct SvdLeastSquares {
    pub eps: f64,
}

impl Default for SvdLeastSquares {
    fn default() -> Self {
        Self { eps: 1e-10 }
    }
}

impl LeastSquares for SvdLeastSquares {
    fn solve(&self, x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>> {
        if x.nrows() != y.len() {
            return Err(DpmError::invalid(
                "design",
                format!("{} rows for {} targets", x.nrows(), y.len()),
            ));
        }
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(DpmError::invalid("design", "empty system"));
        }
        x.clone()
            .svd(true, true)
            .solve(y, self.eps)
            .map_err(|e| DpmError::Corrupted(format!("least squares failed: {e}")))
    }
}
