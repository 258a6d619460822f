use super::read_json;
use crate::detector::DetectParams;
use crate::error::{DpmError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DetectOutputConfig {
    /// Detection report destination; printed to stdout when absent.
    pub json_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DetectConfig {
    pub input_path: PathBuf,
    /// Model files; detections of `models[i]` get class id `i + 1`.
    pub models: Vec<PathBuf>,
    #[serde(default)]
    pub grayscale: bool,
    #[serde(default)]
    pub params: DetectParams,
    #[serde(default)]
    pub output: DetectOutputConfig,
}

pub fn load_detect_config(path: &Path) -> Result<DetectConfig> {
    let config: DetectConfig = read_json(path)?;
    if config.models.is_empty() {
        return Err(DpmError::invalid("models", "at least one model is required"));
    }
    config.params.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn reads_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detect.json");
        fs::write(
            &path,
            r#"{"input_path": "street.png", "models": ["pedestrian.model"], "params": {"threshold": 0.2}}"#,
        )
        .unwrap();
        let cfg = load_detect_config(&path).unwrap();
        assert_eq!(cfg.models, vec![PathBuf::from("pedestrian.model")]);
        assert_eq!(cfg.params.threshold, 0.2);
        assert_eq!(cfg.params.interval, 8);
        assert!(cfg.output.json_out.is_none());
    }

    #[test]
    fn rejects_missing_models_and_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detect.json");
        fs::write(&path, r#"{"input_path": "a.png", "models": []}"#).unwrap();
        assert!(matches!(
            load_detect_config(&path),
            Err(DpmError::InvalidParams { field: "models", .. })
        ));
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_detect_config(&path), Err(DpmError::Json { .. })));
        assert!(matches!(
            load_detect_config(&dir.path().join("missing.json")),
            Err(DpmError::Io { .. })
        ));
    }
}
