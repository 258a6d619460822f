//! Files a training run keeps in its working directory.
//!
//! | file                       | contents                                   |
//! |----------------------------|--------------------------------------------|
//! | `model`                    | rolling model checkpoint, final on success |
//! | `init.model`               | model right after part initialisation      |
//! | `model.<c>.<d>`            | model after mining round `d` of relabel `c`|
//! | `positive_vectors`         | latent positives of the current relabel    |
//! | `negative_vectors`         | hard-negative cache                        |
//! | `gradient_descent_progress`| `<c> <d>` of the round in progress         |
//!
//! Missing files mean "not reached yet" and never raise errors.
use crate::error::{DpmError, Result};
use crate::extract::io::read_optional;
use crate::model::io::{read_model_file, write_atomically, write_model_file, TokenReader};
use crate::model::{MixtureModel, ModelState};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct CheckpointPaths {
    pub workdir: PathBuf,
    pub model: PathBuf,
    pub init_model: PathBuf,
    pub positives: PathBuf,
    pub negatives: PathBuf,
    pub progress: PathBuf,
}

impl CheckpointPaths {
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            model: workdir.join("model"),
            init_model: workdir.join("init.model"),
            positives: workdir.join("positive_vectors"),
            negatives: workdir.join("negative_vectors"),
            progress: workdir.join("gradient_descent_progress"),
        }
    }

    /// Snapshot written after mining round `round` of relabel `relabel`.
    pub fn round_model(&self, relabel: usize, round: usize) -> PathBuf {
        self.workdir.join(format!("model.{relabel}.{round}"))
    }
}

/// Model file at `path`, or `None` if nothing was written yet.
pub fn read_checkpoint(path: &Path) -> Result<Option<(ModelState, MixtureModel)>> {
    if !path.exists() {
        return Ok(None);
    }
    read_model_file(path).map(Some)
}

pub fn write_checkpoint(path: &Path, model: &MixtureModel) -> Result<()> {
    write_model_file(
        path,
        model,
        ModelState::InProgress {
            count: model.len(),
        },
    )
}

pub fn write_progress(path: &Path, relabel: usize, round: usize) -> Result<()> {
    write_atomically(path, &format!("{relabel} {round}\n"))
}

/// `(relabel, round)` of the interrupted round, if any.
pub fn read_progress(path: &Path) -> Result<Option<(usize, usize)>> {
    let Some(text) = read_optional(path)? else {
        return Ok(None);
    };
    let mut rd = TokenReader::new(path, &text);
    let relabel = rd.count("relabel index")?;
    let round = rd.count("mining round")?;
    Ok(Some((relabel, round)))
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DpmError::io(path, e)),
    }
}
