//! Latent SVM training of a mixture model.
//!
//! # Overview
//! 1. Split the positives by aspect ratio into components and size each
//!    root filter ([`samples`]).
//! 2. Fit every root on warped positives and random background windows
//!    ([`root_init`]), then refine the mixture with latent component
//!    labels ([`coordinate`]).
//! 3. Carve part filters out of each up-sampled root ([`parts`]).
//! 4. Alternate latent relabelling of the positives with hard-negative
//!    mining and SGD ([`mining`], [`sgd`]).
//! 5. Fit the bounding-box regressors on the final latent positives
//!    ([`regression`]).
//!
//! Every stage leaves its result in the working directory
//! ([`checkpoint`]); a restarted run skips what is already there and
//! resumes mining at the interrupted round.

pub mod checkpoint;
pub mod coordinate;
pub mod mining;
pub mod params;
pub mod parts;
pub mod regression;
pub mod root_init;
pub mod samples;
pub mod sgd;

pub use params::TrainParams;

use crate::diagnostics::{ProgressSink, TrainEvent, TrainStage};
use crate::error::{DpmError, Result};
use crate::features::worst_asymmetry;
use crate::image::io::load_image;
use crate::image::ImageF32;
use crate::model::{MixtureModel, ModelState, RootClassifier};
use crate::rng::{RandomSource, SeededRng};
use crate::solver::{DualCoordinateSvm, SvdLeastSquares};
use crate::types::Rect;
use checkpoint::{read_checkpoint, remove_if_exists, write_checkpoint, CheckpointPaths};
use samples::ComponentLayout;
use std::fs;
use std::path::{Path, PathBuf};

/// Examples between two refreshes of the scoring model during SGD.
pub const MINI_BATCH: usize = 10;
/// Examples between two weight-decay steps during SGD.
pub const REGQ: usize = 100;

pub(crate) const STREAM_ROOT_INIT: u64 = 1;
pub(crate) const STREAM_ROOT_OPTIMIZE: u64 = 2;
pub(crate) const STREAM_MINING: u64 = 3;
pub(crate) const STREAM_DESCENT: u64 = 4;

/// Report each root whose weights are not mirror-invariant.
pub(crate) fn report_symmetry(model: &MixtureModel, sink: &mut dyn ProgressSink) {
    for (component, root) in model.roots.iter().enumerate() {
        if let Some(a) = worst_asymmetry(&root.w) {
            sink.emit(&TrainEvent::SymmetryViolation {
                component,
                y: a.y,
                x: a.x,
                channel: a.channel,
                magnitude: a.magnitude,
            });
        }
    }
}

/// Annotated images of one training run.
#[derive(Clone, Debug, Default)]
pub struct TrainingData {
    pub positives: Vec<PathBuf>,
    /// Object box in each positive, same order as `positives`.
    pub bboxes: Vec<Rect>,
    /// Images without the object.
    pub backgrounds: Vec<PathBuf>,
    /// Random background windows drawn for root initialisation.
    pub negative_count: usize,
}

impl TrainingData {
    pub fn validate(&self, components: usize) -> Result<()> {
        if self.positives.is_empty() {
            return Err(DpmError::invalid("positives", "no positive images"));
        }
        if self.positives.len() != self.bboxes.len() {
            return Err(DpmError::invalid(
                "bboxes",
                format!("{} boxes for {} positives", self.bboxes.len(), self.positives.len()),
            ));
        }
        if let Some(i) = self.bboxes.iter().position(|b| b.width <= 0 || b.height <= 0) {
            return Err(DpmError::invalid("bboxes", format!("box {i} is empty")));
        }
        if self.positives.len() < components {
            return Err(DpmError::invalid(
                "positives",
                format!("{} positives for {components} components", self.positives.len()),
            ));
        }
        if self.backgrounds.is_empty() {
            return Err(DpmError::invalid("backgrounds", "no background images"));
        }
        if self.negative_count == 0 {
            return Err(DpmError::invalid("negative_count", "must be positive"));
        }
        Ok(())
    }
}

/// Where training images come from.
pub trait ImageSource {
    fn load(&self, path: &Path, grayscale: bool) -> Result<ImageF32>;
}

/// Decodes images from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn load(&self, path: &Path, grayscale: bool) -> Result<ImageF32> {
        load_image(path, grayscale)
    }
}

#[derive(Clone, Debug)]
pub struct Trainer {
    params: TrainParams,
    workdir: PathBuf,
}

impl Trainer {
    pub fn new(params: TrainParams, workdir: impl Into<PathBuf>) -> Self {
        Self {
            params,
            workdir: workdir.into(),
        }
    }

    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Train on images read from disk.
    pub fn train(&self, data: &TrainingData, sink: &mut dyn ProgressSink) -> Result<MixtureModel> {
        self.train_with(&FileImageSource, data, sink)
    }

    /// Train, resuming from whatever the working directory already holds.
    /// The finished model is also written to `<workdir>/model`.
    pub fn train_with(
        &self,
        source: &dyn ImageSource,
        data: &TrainingData,
        sink: &mut dyn ProgressSink,
    ) -> Result<MixtureModel> {
        let params = &self.params;
        params.validate(data.negative_count)?;
        data.validate(params.components)?;
        fs::create_dir_all(&self.workdir).map_err(|e| DpmError::io(&self.workdir, e))?;
        let paths = CheckpointPaths::new(&self.workdir);
        let layout = ComponentLayout::from_boxes(&data.bboxes, params.components, params.min_area, params.max_area);

        let mut model = match read_checkpoint(&paths.model)? {
            Some((ModelState::Complete, model)) => {
                log::info!("{} already holds a trained model", paths.model.display());
                return Ok(model);
            }
            Some((ModelState::InProgress { count }, model)) => {
                if count != params.components {
                    return Err(DpmError::Corrupted(format!(
                        "checkpoint has {count} components, training asks for {}",
                        params.components
                    )));
                }
                log::info!("resuming from checkpoint with {} of {count} roots", model.len());
                model
            }
            None => MixtureModel::default(),
        };
        model.roots.resize_with(params.components, RootClassifier::default);

        if model.roots.iter().all(RootClassifier::is_initialized) {
            sink.emit(&TrainEvent::StageSkipped {
                stage: TrainStage::RootInit,
            });
        } else {
            model = self.initialize_roots(source, data, &layout, sink)?;
            write_checkpoint(&paths.model, &model)?;
        }

        if model.roots.iter().all(|r| !r.parts.is_empty()) {
            sink.emit(&TrainEvent::StageSkipped {
                stage: TrainStage::PartInit,
            });
        } else {
            sink.emit(&TrainEvent::StageStarted {
                stage: TrainStage::PartInit,
            });
            for (component, root) in model.roots.iter_mut().enumerate() {
                if !root.parts.is_empty() {
                    continue;
                }
                let placed = parts::initialize_parts(root, params.parts, params.symmetric);
                sink.emit(&TrainEvent::PartsInitialized { component, parts: placed });
            }
            write_checkpoint(&paths.model, &model)?;
            write_checkpoint(&paths.init_model, &model)?;
        }

        sink.emit(&TrainEvent::StageStarted {
            stage: TrainStage::Mining,
        });
        model = mining::relabel_and_mine(model, source, data, params, &paths, sink)?;

        sink.emit(&TrainEvent::StageStarted {
            stage: TrainStage::Regression,
        });
        let positives = mining::collect_positives(source, data, &model, params)?;
        regression::fit_bbox_regressors(
            &mut model,
            &positives,
            &data.bboxes,
            params.discard_estimating_constant,
            &SvdLeastSquares::default(),
            sink,
        )?;

        model.save(&paths.model)?;
        remove_if_exists(&paths.progress)?;
        sink.emit(&TrainEvent::Finished {
            components: model.len(),
        });
        Ok(model)
    }

    fn initialize_roots(
        &self,
        source: &dyn ImageSource,
        data: &TrainingData,
        layout: &ComponentLayout,
        sink: &mut dyn ProgressSink,
    ) -> Result<MixtureModel> {
        let params = &self.params;
        sink.emit(&TrainEvent::StageStarted {
            stage: TrainStage::RootInit,
        });
        let positives = samples::summon_positives(source, data, &layout.shapes, params.grayscale)?;
        for (component, warped) in positives.iter().enumerate() {
            let count = warped
                .iter()
                .zip(&layout.labels)
                .filter(|(v, &l)| v.is_some() && l == component)
                .count();
            sink.emit(&TrainEvent::PositivesCollected { component, count });
        }

        let mut rng = SeededRng::derived(params.seed, &[STREAM_ROOT_INIT]);
        let negatives = samples::collect_random_negatives(
            &mut rng,
            source,
            &data.backgrounds,
            data.negative_count,
            &layout.shapes,
            params.grayscale,
        )?;
        let negnum = negatives.first().map_or(0, Vec::len);
        sink.emit(&TrainEvent::NegativesCollected { count: negnum });
        let negative_labels: Vec<usize> = (0..negnum).map(|_| rng.uniform_int(params.components)).collect();

        let svm = DualCoordinateSvm {
            seed: params.seed,
            ..DualCoordinateSvm::default()
        };
        let mut roots = Vec::with_capacity(params.components);
        for (component, &shape) in layout.shapes.iter().enumerate() {
            let root = root_init::initialize_root(
                &svm,
                component,
                shape,
                &positives[component],
                &layout.labels,
                &negatives[component],
                &negative_labels,
                params.c,
                params.symmetric,
            )?;
            sink.emit(&TrainEvent::RootInitialized {
                component,
                beta: root.beta,
            });
            roots.push(root);
        }
        let mut model = MixtureModel::new(roots);
        if params.symmetric {
            report_symmetry(&model, sink);
        }

        if params.components > 1 {
            sink.emit(&TrainEvent::StageStarted {
                stage: TrainStage::RootOptimize,
            });
            model = coordinate::optimize_root_mixture(model, &positives, &negatives, params, sink)?;
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::features::FeatureMap;

    fn data() -> TrainingData {
        TrainingData {
            positives: vec!["a.png".into(), "b.png".into()],
            bboxes: vec![Rect::new(0, 0, 10, 20), Rect::new(5, 5, 10, 10)],
            backgrounds: vec!["bg.png".into()],
            negative_count: 2000,
        }
    }

    #[test]
    fn data_validation_catches_mismatches() {
        assert!(data().validate(2).is_ok());
        assert!(data().validate(3).is_err());
        let mut d = data();
        d.bboxes.pop();
        assert!(d.validate(1).is_err());
        let mut d = data();
        d.bboxes[1].width = 0;
        assert!(d.validate(1).is_err());
        let mut d = data();
        d.backgrounds.clear();
        assert!(d.validate(1).is_err());
    }

    #[test]
    fn symmetry_report_names_the_offending_cell() {
        let mut w = FeatureMap::zeros(1, 2);
        w.cell_mut(0, 0)[0] = 1.0;
        let model = MixtureModel::new(vec![
            RootClassifier::new(FeatureMap::zeros(1, 2), 0.0),
            RootClassifier::new(w, 0.0),
        ]);
        let mut sink = RecordingSink::default();
        report_symmetry(&model, &mut sink);
        assert_eq!(sink.events.len(), 1);
        match &sink.events[0] {
            TrainEvent::SymmetryViolation { component, y, .. } => assert_eq!((*component, *y), (1, 0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn finished_model_in_workdir_is_returned_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let model = MixtureModel::new(vec![RootClassifier::new(FeatureMap::zeros(2, 2), 0.5)]);
        model.save(&dir.path().join("model")).unwrap();
        let trainer = Trainer::new(TrainParams::default(), dir.path());
        let mut sink = RecordingSink::default();
        let back = trainer.train(&data(), &mut sink).unwrap();
        assert_eq!(back, model);
        assert!(sink.events.is_empty());
    }

    #[test]
    fn checkpoint_with_other_component_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let model = MixtureModel::new(vec![RootClassifier::new(FeatureMap::zeros(2, 2), 0.5)]);
        write_checkpoint(&dir.path().join("model"), &model).unwrap();
        let params = TrainParams {
            components: 2,
            ..TrainParams::default()
        };
        let err = Trainer::new(params, dir.path())
            .train(&data(), &mut RecordingSink::default())
            .unwrap_err();
        assert!(matches!(err, DpmError::Corrupted(_)), "got {err}");
    }
}
