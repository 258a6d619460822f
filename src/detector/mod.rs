//! Multi-scale DPM detection.
//!
//! # Overview
//! 1. Build one HOG pyramid for the image, sized so the smallest root of any
//!    model still fits at the coarsest level.
//! 2. For each model, scan every component at every root level, keeping
//!    placements whose score (root response, best deformed parts, bias) is
//!    above the threshold. Root boxes are corrected by the bounding-box
//!    regressors; part boxes are reported at their chosen displacements.
//! 3. Merge each model's candidates (see [`nms`]), optionally followed by a
//!    class-agnostic suppression across models.
//!
//! Models are numbered from 1 in the order given; the number is the
//! detection's `class_id`.

pub mod nms;
pub mod params;
pub mod scan;

pub use params::{DetectFlags, DetectParams};

use crate::diagnostics::{DetectionReport, InputDescriptor, TimingBreakdown};
use crate::image::ImageF32;
use crate::model::MixtureModel;
use crate::pyramid::{scale_upto, FeaturePyramid};
use crate::types::Rect;
use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartDetection {
    pub rect: Rect,
    /// Zero-based model index.
    pub class_id: i32,
    /// Best deformed part response at this placement.
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub rect: Rect,
    /// One-based model index.
    pub class_id: i32,
    pub confidence: f32,
    /// Candidates merged into this detection.
    pub neighbors: usize,
    pub parts: Vec<PartDetection>,
}

#[derive(Clone, Debug, Default)]
pub struct Detector {
    params: DetectParams,
}

impl Detector {
    pub fn new(params: DetectParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectParams {
        &self.params
    }

    /// Detections of all `models` in `image`; empty when the image is too
    /// small for every model.
    pub fn detect(&self, image: &ImageF32, models: &[MixtureModel]) -> Vec<Detection> {
        self.detect_with_report(image, models).detections
    }

    pub fn detect_with_report(&self, image: &ImageF32, models: &[MixtureModel]) -> DetectionReport {
        let t_total = Instant::now();
        let mut timings = TimingBreakdown::default();
        let input = InputDescriptor {
            width: image.w,
            height: image.h,
            channels: image.channels,
        };
        let refs: Vec<&MixtureModel> = models.iter().filter(|m| !m.is_empty()).collect();
        let upto = scale_upto(image, &refs, self.params.interval);
        if refs.is_empty() || upto < 0 {
            log::debug!(
                "Detector::detect image {}x{} too small (scale_upto={upto})",
                image.w,
                image.h
            );
            timings.total_ms = t_total.elapsed().as_secs_f64() * 1000.0;
            return DetectionReport {
                input,
                levels: 0,
                candidates: 0,
                detections: Vec::new(),
                timings,
            };
        }

        let interval = self.params.interval;
        let pyr = timings.measure("pyramid", || FeaturePyramid::build(image, interval, upto as usize));

        let mut candidates = 0;
        let mut detections = Vec::new();
        for (c, model) in models.iter().enumerate() {
            let threshold = self.params.threshold;
            let found = timings.measure(format!("scan[{c}]"), || {
                scan::scan_model(&pyr, model, c as i32 + 1, threshold)
            });
            candidates += found.len();
            let min_neighbors = self.params.min_neighbors;
            let merged = timings.measure(format!("merge[{c}]"), || {
                nms::merge_candidates(found, min_neighbors)
            });
            detections.extend(merged);
        }
        if self.params.flags.no_nested {
            detections = timings.measure("no_nested", || nms::suppress_nested(detections));
        }
        timings.total_ms = t_total.elapsed().as_secs_f64() * 1000.0;
        log::debug!(
            "Detector::detect levels={} candidates={} detections={} latency_ms={:.3}",
            pyr.levels.len(),
            candidates,
            detections.len(),
            timings.total_ms
        );
        DetectionReport {
            input,
            levels: pyr.levels.len(),
            candidates,
            detections,
            timings,
        }
    }
}

/// One-shot detection with `params`.
pub fn detect_objects(image: &ImageF32, models: &[MixtureModel], params: &DetectParams) -> Vec<Detection> {
    Detector::new(params.clone()).detect(image, models)
}
