//! Numerical solvers used by training: a linear SVM for root
//! initialisation and least squares for bounding-box regression.

pub mod lsq;
pub mod svm;

pub use lsq::{LeastSquares, SvdLeastSquares};
pub use svm::{DualCoordinateSvm, LinearClassifier, LinearProblem, LinearSolution};
