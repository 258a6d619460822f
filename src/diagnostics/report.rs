use super::TimingBreakdown;
use crate::detector::Detection;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputDescriptor {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

/// Result of [`Detector::detect_with_report`](crate::Detector::detect_with_report).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub input: InputDescriptor,
    /// Pyramid levels built; 0 when the image was too small.
    pub levels: usize,
    /// Candidates above threshold before merging.
    pub candidates: usize,
    pub detections: Vec<Detection>,
    pub timings: TimingBreakdown,
}
