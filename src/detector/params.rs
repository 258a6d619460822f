//! Parameters of the detection pass.
//!
//! Defaults suit a trained model applied to natural images: eight levels per
//! octave, at least one supporting candidate per reported box and a score
//! threshold of 0.6.

use crate::error::{DpmError, Result};
use serde::{Deserialize, Serialize};

/// Behaviour switches of the post-processing stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectFlags {
    /// Merge overlapping detections across all models, keeping the most
    /// confident of each group.
    pub no_nested: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectParams {
    /// Pyramid levels inserted between two octaves.
    pub interval: usize,
    /// Minimum group size for a merged detection; 0 disables merging.
    pub min_neighbors: usize,
    pub flags: DetectFlags,
    /// Candidates must score strictly above this (response plus bias).
    pub threshold: f32,
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            interval: 8,
            min_neighbors: 1,
            flags: DetectFlags::default(),
            threshold: 0.6,
        }
    }
}

impl DetectParams {
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_neighbors(mut self, min_neighbors: usize) -> Self {
        self.min_neighbors = min_neighbors;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(DpmError::invalid("interval", "must be at least 1"));
        }
        if !self.threshold.is_finite() {
            return Err(DpmError::invalid("threshold", "must be finite"));
        }
        Ok(())
    }
}
