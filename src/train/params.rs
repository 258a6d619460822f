//! Parameters of a training run.
//!
//! Defaults reproduce the reference training setup: one symmetric component
//! with eight parts, ten latent relabelling rounds of up to fifty mining
//! rounds each, and an SGD schedule starting at 0.01 that decays by 0.995
//! per epoch.

use super::{MINI_BATCH, REGQ};
use crate::detector::DetectParams;
use crate::error::{DpmError, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainParams {
    /// Mixture components (aspect-ratio clusters).
    pub components: usize,
    /// Part filters per component.
    pub parts: usize,
    pub grayscale: bool,
    /// Train left-right symmetric filters.
    pub symmetric: bool,
    /// Keep the root intercepts of the bounding-box regressors at zero.
    pub discard_estimating_constant: bool,
    /// Bounds in pixels² on the area that sizes the root filters.
    pub min_area: i64,
    pub max_area: i64,
    /// Relabel rounds of the root-only mixture optimisation.
    pub root_relabels: usize,
    pub relabels: usize,
    pub data_minings: usize,
    /// SGD epochs per round.
    pub iterations: usize,
    /// Initial SGD step.
    pub alpha: f64,
    /// Step decay per epoch.
    pub alpha_ratio: f64,
    /// Weight of positives against negatives.
    pub balance: f64,
    pub negative_cache_size: usize,
    /// Minimum overlap between a positive's box and its latent placement.
    pub include_overlap: f64,
    /// Hinge loss weight.
    #[serde(rename = "C", alias = "c")]
    pub c: f64,
    /// Positive-score percentile the bias is moved to when mining stalls.
    pub percentile_breakdown: f64,
    pub seed: u64,
    /// Pyramid settings used while collecting training windows.
    pub detector: DetectParams,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            components: 1,
            parts: 8,
            grayscale: false,
            symmetric: true,
            discard_estimating_constant: true,
            min_area: 3000,
            max_area: 5000,
            root_relabels: 20,
            relabels: 10,
            data_minings: 50,
            iterations: 1000,
            alpha: 0.01,
            alpha_ratio: 0.995,
            balance: 1.5,
            negative_cache_size: 2000,
            include_overlap: 0.7,
            c: 0.002,
            percentile_breakdown: 0.05,
            seed: 0,
            detector: DetectParams {
                interval: 5,
                ..DetectParams::default()
            },
        }
    }
}

impl TrainParams {
    /// Check every bound before any work starts. `negative_count` is the
    /// number of random negatives requested for root initialisation.
    pub fn validate(&self, negative_count: usize) -> Result<()> {
        if self.components == 0 {
            return Err(DpmError::invalid("components", "must be at least 1"));
        }
        if self.parts == 0 {
            return Err(DpmError::invalid("parts", "must be at least 1"));
        }
        if self.min_area <= 100 {
            return Err(DpmError::invalid("min_area", "must exceed 100"));
        }
        if self.max_area <= self.min_area {
            return Err(DpmError::invalid("max_area", "must exceed min_area"));
        }
        if self.negative_cache_size == 0 {
            return Err(DpmError::invalid("negative_cache_size", "must be positive"));
        }
        if self.negative_cache_size > negative_count {
            return Err(DpmError::invalid(
                "negative_cache_size",
                format!("{} exceeds the {negative_count} requested negatives", self.negative_cache_size),
            ));
        }
        if self.negative_cache_size <= REGQ || self.negative_cache_size <= MINI_BATCH {
            return Err(DpmError::invalid(
                "negative_cache_size",
                format!("must exceed {}", REGQ.max(MINI_BATCH)),
            ));
        }
        if !(self.include_overlap > 0.1) {
            return Err(DpmError::invalid("include_overlap", "must exceed 0.1"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(DpmError::invalid("alpha", "must lie in (0, 1)"));
        }
        if !(self.alpha_ratio > 0.0 && self.alpha_ratio < 1.0) {
            return Err(DpmError::invalid("alpha_ratio", "must lie in (0, 1)"));
        }
        if !(self.c > 0.0) {
            return Err(DpmError::invalid("C", "must be positive"));
        }
        if !(self.balance > 0.0) {
            return Err(DpmError::invalid("balance", "must be positive"));
        }
        if !(self.percentile_breakdown > 0.0 && self.percentile_breakdown <= 1.0) {
            return Err(DpmError::invalid("percentile_breakdown", "must lie in (0, 1]"));
        }
        self.detector.validate()
    }
}
