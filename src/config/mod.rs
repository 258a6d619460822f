//! JSON run configurations for the command-line tools.
//!
//! Each loader reads the whole file, deserialises it with `serde_json` and
//! validates the embedded parameters before returning.

pub mod detect;
pub mod train;

pub use detect::{load_detect_config, DetectConfig, DetectOutputConfig};
pub use train::{load_train_config, PositiveSample, TrainConfig};

use crate::error::{DpmError, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|e| DpmError::io(path, e))?;
    serde_json::from_str(&contents).map_err(|source| DpmError::Json {
        path: path.to_path_buf(),
        source,
    })
}
