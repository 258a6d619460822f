#![doc = include_str!("../README.md")]

// Public modules (stable-ish surface)
pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod image;
pub mod model;
pub mod train;
pub mod types;

// “Expert” modules – the building blocks of detection and training.
pub mod extract;
pub mod features;
pub mod pyramid;
pub mod rng;
pub mod score;
pub mod solver;

// --- High-level re-exports -------------------------------------------------

pub use crate::detector::{Detection, Detector, DetectParams};
pub use crate::error::{DpmError, Result};
pub use crate::model::MixtureModel;
pub use crate::train::{Trainer, TrainParams, TrainingData};
pub use crate::types::Rect;

// --- Prelude ---------------------------------------------------------------

/// Small prelude for quick experiments.
///
/// ```no_run
/// use dpm_detector::prelude::*;
///
/// # fn main() {
/// let (w, h) = (320usize, 240usize);
/// let gray = vec![0u8; w * h];
/// let image = ImageU8::gray(w, h, &gray).to_f32();
///
/// let detector = Detector::new(DetectParams::default().with_threshold(0.0));
/// let report = detector.detect_with_report(&image, &[MixtureModel::default()]);
/// println!("levels={} total_ms={:.3}", report.levels, report.timings.total_ms);
/// # }
/// ```
pub mod prelude {
    pub use crate::diagnostics::{DetectionReport, LogSink, ProgressSink, RecordingSink, TrainEvent};
    pub use crate::image::{ImageF32, ImageU8};
    pub use crate::{
        Detection, Detector, DetectParams, DpmError, MixtureModel, Rect, Result, TrainParams, Trainer,
        TrainingData,
    };
}
