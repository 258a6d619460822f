mod common;

use common::synthetic_image::{noise, object_on_noise, MemoryImages};
use dpm_detector::diagnostics::{ProgressSink, RecordingSink, TrainEvent, TrainStage};
use dpm_detector::features::is_symmetric;
use dpm_detector::prelude::*;
use dpm_detector::train::checkpoint::read_progress;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

fn fixture() -> (MemoryImages, TrainingData) {
    let mut images = MemoryImages::default();
    let bbox = Rect::new(32, 32, 32, 32);
    let mut data = TrainingData {
        negative_count: 120,
        ..TrainingData::default()
    };
    for i in 0..8u32 {
        let path = format!("pos/{i}.png");
        images.insert(path.as_str(), object_on_noise(96, 96, bbox, i + 1));
        data.positives.push(path.into());
        data.bboxes.push(bbox);
    }
    for i in 0..4u32 {
        let path = format!("bg/{i}.png");
        images.insert(path.as_str(), noise(96, 96, 100 + i));
        data.backgrounds.push(path.into());
    }
    (images, data)
}

fn small_params() -> TrainParams {
    TrainParams {
        parts: 4,
        grayscale: true,
        min_area: 1000,
        max_area: 2000,
        relabels: 1,
        data_minings: 2,
        iterations: 3,
        negative_cache_size: 120,
        seed: 11,
        ..TrainParams::default()
    }
}

fn check_model(model: &MixtureModel) {
    assert_eq!(model.len(), 1);
    let root = &model.roots[0];
    assert_eq!((root.w.rows, root.w.cols), (4, 4));
    assert!(root.w.data.iter().all(|v| v.is_finite()));
    assert!(root.beta.is_finite());
    assert!(is_symmetric(&root.w));
    assert_eq!(root.parts.len(), 4);
    for (i, part) in root.parts.iter().enumerate() {
        assert!(part.dxx >= 0.01 && part.dyy >= 0.01, "part {i}: {part:?}");
        assert_eq!(part.z, 1);
        if let Some(j) = part.counterpart {
            assert_eq!(root.parts[j].counterpart, Some(i));
        }
    }
}

#[test]
fn small_run_produces_a_complete_model() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (images, data) = fixture();
    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(small_params(), dir.path());
    let mut sink = RecordingSink::default();
    let model = trainer.train_with(&images, &data, &mut sink).unwrap();
    check_model(&model);

    let events = &sink.events;
    assert_eq!(
        events.first(),
        Some(&TrainEvent::StageStarted {
            stage: TrainStage::RootInit
        })
    );
    assert_eq!(events.last(), Some(&TrainEvent::Finished { components: 1 }));
    for expected in [
        TrainEvent::PositivesCollected { component: 0, count: 8 },
        TrainEvent::NegativesCollected { count: 120 },
        TrainEvent::PartsInitialized { component: 0, parts: 4 },
        TrainEvent::ProgressSaved { relabel: 0, round: 0 },
        TrainEvent::ProgressSaved { relabel: 0, round: 1 },
    ] {
        assert!(events.contains(&expected), "missing {expected:?}");
    }

    let workdir = dir.path();
    assert_eq!(MixtureModel::load(&workdir.join("model")).unwrap(), model);
    assert!(workdir.join("init.model").exists());
    for gone in ["gradient_descent_progress", "negative_vectors", "positive_vectors"] {
        assert!(!workdir.join(gone).exists(), "{gone} left behind");
    }

    // A finished working directory short-circuits.
    let mut again = RecordingSink::default();
    assert_eq!(trainer.train_with(&images, &data, &mut again).unwrap(), model);
    assert!(again.events.is_empty());
}

/// Aborts the run once the second mining round has been recorded.
struct InterruptingSink;

impl ProgressSink for InterruptingSink {
    fn emit(&mut self, event: &TrainEvent) {
        if *event == (TrainEvent::ProgressSaved { relabel: 0, round: 1 }) {
            panic!("simulated interruption");
        }
    }
}

fn run_to_end(workdir: &Path, images: &MemoryImages, data: &TrainingData) -> (MixtureModel, Vec<TrainEvent>) {
    let mut sink = RecordingSink::default();
    let model = Trainer::new(small_params(), workdir)
        .train_with(images, data, &mut sink)
        .unwrap();
    (model, sink.events)
}

#[test]
fn interrupted_run_resumes_to_the_same_model() {
    let (images, data) = fixture();
    let reference_dir = tempfile::tempdir().unwrap();
    let (reference, _) = run_to_end(reference_dir.path(), &images, &data);

    let dir = tempfile::tempdir().unwrap();
    let trainer = Trainer::new(small_params(), dir.path());
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        trainer.train_with(&images, &data, &mut InterruptingSink)
    }));
    assert!(outcome.is_err());
    assert_eq!(
        read_progress(&dir.path().join("gradient_descent_progress")).unwrap(),
        Some((0, 1))
    );
    assert!(dir.path().join("negative_vectors").exists());
    assert!(dir.path().join("positive_vectors").exists());

    let (resumed, events) = run_to_end(dir.path(), &images, &data);
    for expected in [
        TrainEvent::StageSkipped {
            stage: TrainStage::RootInit,
        },
        TrainEvent::StageSkipped {
            stage: TrainStage::PartInit,
        },
        TrainEvent::Resumed { relabel: 0, round: 1 },
    ] {
        assert!(events.contains(&expected), "missing {expected:?}");
    }
    assert!(!events.contains(&TrainEvent::ProgressSaved { relabel: 0, round: 0 }));
    assert_eq!(resumed, reference);
}

#[test]
fn invalid_setup_fails_before_touching_the_workdir() {
    let (images, data) = fixture();
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("run");
    let params = TrainParams {
        negative_cache_size: 500,
        ..small_params()
    };
    let err = Trainer::new(params, &workdir)
        .train_with(&images, &data, &mut RecordingSink::default())
        .unwrap_err();
    assert!(matches!(err, DpmError::InvalidParams { .. }), "got {err}");
    assert!(!workdir.exists());

    let mut missing = data.clone();
    missing.positives[3] = "pos/absent.png".into();
    let err = Trainer::new(small_params(), dir.path().join("other"))
        .train_with(&images, &missing, &mut RecordingSink::default())
        .unwrap_err();
    assert!(matches!(err, DpmError::Io { .. }), "got {err}");
}
