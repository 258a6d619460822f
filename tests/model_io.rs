mod common;

use common::models::{patterned_map, two_component_model};
use dpm_detector::error::DpmError;
use dpm_detector::extract::io::{
    read_negative_vectors, read_positive_vectors, write_negative_vectors, write_positive_vectors,
};
use dpm_detector::extract::{FeatureVector, PartVector};
use dpm_detector::model::io::{read_model_file, write_model_file};
use dpm_detector::model::{MixtureModel, ModelState, RootClassifier};
use std::fs;

#[test]
fn saved_model_reads_back_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("pedestrian.model");
    let model = two_component_model();
    model.save(&path).unwrap();

    let back = MixtureModel::load(&path).unwrap();
    assert_eq!(back, model);
    assert_eq!(back.roots[1].parts[0].counterpart, Some(1));
    assert_eq!(back.roots[1].beta.to_bits(), (1.0f32 / 3.0).to_bits());
    assert!(!dir.path().join("nested").join("pedestrian.model.swp").exists());
}

#[test]
fn checkpoint_is_not_a_finished_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model");
    let mut model = two_component_model();
    model.roots.push(RootClassifier::default());
    write_model_file(&path, &model, ModelState::InProgress { count: 3 }).unwrap();

    let err = MixtureModel::load(&path).unwrap_err();
    assert!(matches!(err, DpmError::Format { line: 1, .. }), "got {err}");

    let (state, partial) = read_model_file(&path).unwrap();
    assert_eq!(state, ModelState::InProgress { count: 3 });
    assert_eq!(partial.roots.len(), 2);
    assert_eq!(partial.roots[..], model.roots[..2]);
}

#[test]
fn truncated_model_reports_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model");
    two_component_model().save(&path).unwrap();
    let text = fs::read_to_string(&path).unwrap();
    let cut: String = text.lines().take(5).collect::<Vec<_>>().join("\n");
    fs::write(&path, cut).unwrap();

    match MixtureModel::load(&path) {
        Err(DpmError::Format { line, .. }) => assert!(line >= 1),
        other => panic!("expected a format error, got {other:?}"),
    }
    assert!(matches!(
        MixtureModel::load(&dir.path().join("absent")),
        Err(DpmError::Io { .. })
    ));
}

fn vector(id: usize, seed: usize) -> FeatureVector {
    let mut v = FeatureVector::from_root(id, patterned_map(2, 3, seed));
    v.score = -0.1;
    v.parts.push(PartVector {
        w: patterned_map(1, 2, seed + 1),
        x: 1,
        y: 0,
        z: 1,
        dx: -1.0,
        dy: 2.0,
        dxx: 1.0,
        dyy: 4.0,
    });
    v
}

#[test]
fn vector_caches_keep_empty_slots_and_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let pos_path = dir.path().join("positive_vectors");
    let neg_path = dir.path().join("negative_vectors");
    assert!(read_positive_vectors(&pos_path, 3).unwrap().is_none());
    assert!(read_negative_vectors(&neg_path, 200).unwrap().is_none());

    let positives = vec![Some(vector(0, 1)), None, Some(vector(1, 4))];
    write_positive_vectors(&pos_path, &positives).unwrap();
    assert_eq!(read_positive_vectors(&pos_path, 3).unwrap().unwrap(), positives);
    assert!(read_positive_vectors(&pos_path, 4).is_err());

    let negatives = vec![vector(0, 2), vector(0, 3)];
    write_negative_vectors(&neg_path, &negatives, 200).unwrap();
    assert_eq!(read_negative_vectors(&neg_path, 200).unwrap().unwrap(), negatives);
    assert!(matches!(
        read_negative_vectors(&neg_path, 300),
        Err(DpmError::Format { .. })
    ));
}
