//! Diagnostics data model.
//!
//! `DetectionReport` bundles the detections with per-stage timings and a few
//! counters. Training reports progress as [`TrainEvent`]s through a
//! [`ProgressSink`] borrowed for the duration of a run; [`LogSink`] forwards
//! them to the `log` facade and [`RecordingSink`] keeps them for inspection.

pub mod events;
pub mod report;
pub mod timing;

pub use events::{LogSink, ProgressSink, RecordingSink, TrainEvent, TrainStage};
pub use report::{DetectionReport, InputDescriptor};
pub use timing::{StageTiming, TimingBreakdown};
