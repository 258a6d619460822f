use super::read_json;
use crate::error::Result;
use crate::train::{TrainParams, TrainingData};
use crate::types::Rect;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Deserialize)]
pub struct PositiveSample {
    pub path: PathBuf,
    pub bbox: Rect,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrainConfig {
    pub positives: Vec<PositiveSample>,
    pub backgrounds: Vec<PathBuf>,
    /// Random background windows for root initialisation.
    pub negative_count: usize,
    /// Checkpoints and the final model go here.
    pub workdir: PathBuf,
    #[serde(default)]
    pub params: TrainParams,
}

impl TrainConfig {
    pub fn training_data(&self) -> TrainingData {
        TrainingData {
            positives: self.positives.iter().map(|p| p.path.clone()).collect(),
            bboxes: self.positives.iter().map(|p| p.bbox).collect(),
            backgrounds: self.backgrounds.clone(),
            negative_count: self.negative_count,
        }
    }
}

pub fn load_train_config(path: &Path) -> Result<TrainConfig> {
    let config: TrainConfig = read_json(path)?;
    config.params.validate(config.negative_count)?;
    config.training_data().validate(config.params.components)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DpmError;
    use std::fs;

    const CONFIG: &str = r#"{
        "positives": [
            {"path": "pos/0.png", "bbox": {"x": 4, "y": 6, "width": 40, "height": 80}},
            {"path": "pos/1.png", "bbox": {"x": 0, "y": 0, "width": 36, "height": 70}}
        ],
        "backgrounds": ["bg/0.png"],
        "negative_count": 3000,
        "workdir": "run",
        "params": {"components": 2, "parts": 6, "C": 0.005}
    }"#;

    #[test]
    fn training_data_keeps_box_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, CONFIG).unwrap();
        let cfg = load_train_config(&path).unwrap();
        assert_eq!(cfg.params.components, 2);
        assert_eq!(cfg.params.c, 0.005);
        assert_eq!(cfg.params.negative_cache_size, 2000);
        let data = cfg.training_data();
        assert_eq!(data.positives[1], PathBuf::from("pos/1.png"));
        assert_eq!(data.bboxes[0], Rect::new(4, 6, 40, 80));
        assert_eq!(data.negative_count, 3000);
    }

    #[test]
    fn invalid_params_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        fs::write(&path, CONFIG.replace("3000", "100")).unwrap();
        assert!(matches!(
            load_train_config(&path),
            Err(DpmError::InvalidParams {
                field: "negative_cache_size",
                ..
            })
        ));
    }
}
