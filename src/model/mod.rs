//! Mixture model: components made of a root filter, parts and regressors.

pub mod hexfloat;
pub mod io;

use crate::features::FeatureMap;
use crate::score::distance::Deformation;
use crate::score::Window;

pub use io::ModelState;

/// Part filter anchored inside its component's root, at twice the root's
/// resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct PartClassifier {
    pub w: FeatureMap,
    /// Anchor (top-left cell) in the 2× root frame.
    pub x: i32,
    pub y: i32,
    /// Pyramid level offset relative to the root; always 1.
    pub z: i32,
    pub dx: f64,
    pub dy: f64,
    pub dxx: f64,
    pub dyy: f64,
    /// Bounding-box regression coefficients: `(x, y)` pairs for the centre
    /// drift along x, along y, and the relative scale change.
    pub alpha: [f32; 6],
    /// Mirror partner when the model is symmetric.
    pub counterpart: Option<usize>,
}

impl PartClassifier {
    pub fn new(w: FeatureMap, x: i32, y: i32) -> Self {
        Self {
            w,
            x,
            y,
            z: 1,
            dx: 0.0,
            dy: 0.0,
            dxx: 0.1,
            dyy: 0.1,
            alpha: [0.0; 6],
            counterpart: None,
        }
    }

    pub fn deformation(&self) -> Deformation {
        Deformation {
            dx: self.dx,
            dy: self.dy,
            dxx: self.dxx,
            dyy: self.dyy,
        }
    }
}

/// One mixture component.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RootClassifier {
    pub w: FeatureMap,
    pub beta: f32,
    /// Regression intercepts for centre x, centre y and scale.
    pub alpha: [f32; 3],
    pub parts: Vec<PartClassifier>,
}

impl RootClassifier {
    pub fn new(w: FeatureMap, beta: f32) -> Self {
        Self {
            w,
            beta,
            alpha: [0.0; 3],
            parts: Vec::new(),
        }
    }

    /// A root with empty weights has not been trained yet.
    pub fn is_initialized(&self) -> bool {
        !self.w.is_empty()
    }

    pub fn window(&self) -> Window {
        Window::of(&self.w)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MixtureModel {
    pub roots: Vec<RootClassifier>,
}

impl MixtureModel {
    pub fn new(roots: Vec<RootClassifier>) -> Self {
        Self { roots }
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Smallest root filter extent in cells, `(rows, cols)` taken
    /// independently across components.
    pub fn min_root_cells(&self) -> Option<(usize, usize)> {
        let rows = self.roots.iter().map(|r| r.w.rows).min()?;
        let cols = self.roots.iter().map(|r| r.w.cols).min()?;
        Some((rows, cols))
    }
}
