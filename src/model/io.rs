//! Text serialisation of mixture models.
//!
//! ```text
//! .                                   sentinel: `.` final model, `,` checkpoint
//! <count>                             `<count> <initialized>` for checkpoints
//! per component:
//!   <rows> <cols>
//!   <beta> <alpha0> <alpha1> <alpha2>
//!   <rows * cols * 31 weights>
//!   <part count>
//!   per part:
//!     <x> <y> <z>
//!     <dx> <dy> <dxx> <dyy>
//!     <alpha0> .. <alpha5>
//!     <rows> <cols> <counterpart or -1>
//!     <rows * cols * 31 weights>
//! ```
//!
//! Reals are hexadecimal floats. Checkpoints list only the components that
//! have been initialised. Files are written to `<path>.swp` and renamed into
//! place so a reader never sees a partial model.
use super::hexfloat::{format_hex, parse_hex};
use super::{MixtureModel, PartClassifier, RootClassifier};
use crate::error::{DpmError, Result};
use crate::features::{FeatureMap, FEATURE_CHANNELS};
use crate::image::io::ensure_parent_dir;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

// Header tokens of an empty-filter component and part.
const COMPONENT_MIN_TOKENS: usize = 7;
const PART_MIN_TOKENS: usize = 16;

/// Whether a model file holds a finished model or a training checkpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelState {
    Complete,
    /// Checkpoint of a model that will have `count` components.
    InProgress { count: usize },
}

impl MixtureModel {
    /// Read a finished model.
    pub fn load(path: &Path) -> Result<MixtureModel> {
        match read_model_file(path)? {
            (ModelState::Complete, model) => Ok(model),
            (ModelState::InProgress { .. }, _) => Err(DpmError::Format {
                path: path.to_path_buf(),
                line: 1,
                reason: "file is an unfinished training checkpoint".into(),
            }),
        }
    }

    /// Write a finished model (sentinel `.`).
    pub fn save(&self, path: &Path) -> Result<()> {
        write_model_file(path, self, ModelState::Complete)
    }
}

/// Whitespace tokenizer that remembers line numbers for error reports.
pub(crate) struct TokenReader<'a> {
    path: &'a Path,
    tokens: Vec<(usize, &'a str)>,
    pos: usize,
}

impl<'a> TokenReader<'a> {
    pub(crate) fn new(path: &'a Path, text: &'a str) -> Self {
        let tokens = text
            .lines()
            .enumerate()
            .flat_map(|(i, line)| line.split_whitespace().map(move |t| (i + 1, t)))
            .collect();
        Self {
            path,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> DpmError {
        let line = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |t| t.0);
        DpmError::Format {
            path: self.path.to_path_buf(),
            line,
            reason: reason.into(),
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub(crate) fn token(&mut self, what: &str) -> Result<&'a str> {
        match self.tokens.get(self.pos) {
            Some(&(_, t)) => {
                self.pos += 1;
                Ok(t)
            }
            None => Err(self.error(format!("unexpected end of file, expected {what}"))),
        }
    }

    pub(crate) fn int(&mut self, what: &str) -> Result<i64> {
        let t = self.token(what)?;
        t.parse::<i64>().map_err(|_| {
            self.pos -= 1;
            self.error(format!("expected integer {what}, found `{t}`"))
        })
    }

    pub(crate) fn count(&mut self, what: &str) -> Result<usize> {
        let v = self.int(what)?;
        usize::try_from(v).map_err(|_| {
            self.pos -= 1;
            self.error(format!("{what} must be non-negative, found {v}"))
        })
    }

    fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }

    /// A count of records that take at least `tokens_each` tokens apiece.
    /// Counts the rest of the file cannot hold are format errors.
    pub(crate) fn items(&mut self, what: &str, tokens_each: usize) -> Result<usize> {
        let n = self.count(what)?;
        let needed = n.checked_mul(tokens_each);
        if needed.map_or(true, |needed| needed > self.remaining()) {
            self.pos -= 1;
            return Err(self.error(format!(
                "{what} {n} exceeds the {} tokens left in the file",
                self.remaining()
            )));
        }
        Ok(n)
    }

    pub(crate) fn real(&mut self, what: &str) -> Result<f64> {
        let t = self.token(what)?;
        parse_hex(t).ok_or_else(|| {
            self.pos -= 1;
            self.error(format!("expected real {what}, found `{t}`"))
        })
    }

    pub(crate) fn weights(&mut self, rows: usize, cols: usize) -> Result<FeatureMap> {
        let n = rows
            .checked_mul(cols)
            .and_then(|cells| cells.checked_mul(FEATURE_CHANNELS))
            .filter(|&n| n <= self.remaining())
            .ok_or_else(|| {
                self.error(format!(
                    "{rows}x{cols} filter exceeds the {} tokens left in the file",
                    self.remaining()
                ))
            })?;
        let mut data = Vec::with_capacity(n);
        for _ in 0..n {
            data.push(self.real("weight")? as f32);
        }
        Ok(FeatureMap::from_vec(rows, cols, data))
    }
}

pub(crate) fn push_weights(out: &mut String, w: &FeatureMap) {
    for &v in &w.data {
        out.push_str(&format_hex(v as f64));
        out.push(' ');
    }
    out.push('\n');
}

pub(crate) fn swap_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".swp");
    PathBuf::from(name)
}

/// Write `contents` to `<path>.swp` then rename over `path`.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    let swp = swap_path(path);
    fs::write(&swp, contents).map_err(|e| DpmError::io(&swp, e))?;
    fs::rename(&swp, path).map_err(|e| DpmError::io(path, e))
}

fn encode_model(model: &MixtureModel, state: ModelState) -> String {
    let mut out = String::new();
    let initialized: Vec<&RootClassifier> = match state {
        ModelState::Complete => {
            let _ = writeln!(out, ".\n{}", model.roots.len());
            model.roots.iter().collect()
        }
        ModelState::InProgress { count } => {
            let done: Vec<&RootClassifier> =
                model.roots.iter().take_while(|r| r.is_initialized()).collect();
            let _ = writeln!(out, ",\n{} {}", count, done.len());
            done
        }
    };
    for root in initialized {
        let _ = writeln!(out, "{} {}", root.w.rows, root.w.cols);
        let _ = writeln!(
            out,
            "{} {} {} {}",
            format_hex(root.beta as f64),
            format_hex(root.alpha[0] as f64),
            format_hex(root.alpha[1] as f64),
            format_hex(root.alpha[2] as f64)
        );
        push_weights(&mut out, &root.w);
        let _ = writeln!(out, "{}", root.parts.len());
        for part in &root.parts {
            let _ = writeln!(out, "{} {} {}", part.x, part.y, part.z);
            let _ = writeln!(
                out,
                "{} {} {} {}",
                format_hex(part.dx),
                format_hex(part.dy),
                format_hex(part.dxx),
                format_hex(part.dyy)
            );
            let alphas: Vec<String> = part.alpha.iter().map(|&a| format_hex(a as f64)).collect();
            let _ = writeln!(out, "{}", alphas.join(" "));
            let counterpart = part.counterpart.map_or(-1, |c| c as i64);
            let _ = writeln!(out, "{} {} {}", part.w.rows, part.w.cols, counterpart);
            push_weights(&mut out, &part.w);
        }
    }
    out
}

pub fn write_model_file(path: &Path, model: &MixtureModel, state: ModelState) -> Result<()> {
    write_atomically(path, &encode_model(model, state))
}

fn decode_part(rd: &mut TokenReader<'_>, part_count: usize) -> Result<PartClassifier> {
    let x = rd.int("part x")? as i32;
    let y = rd.int("part y")? as i32;
    let z = rd.int("part z")? as i32;
    let dx = rd.real("dx")?;
    let dy = rd.real("dy")?;
    let dxx = rd.real("dxx")?;
    let dyy = rd.real("dyy")?;
    let mut alpha = [0.0f32; 6];
    for a in &mut alpha {
        *a = rd.real("part alpha")? as f32;
    }
    let rows = rd.count("part rows")?;
    let cols = rd.count("part cols")?;
    let counterpart = match rd.int("counterpart")? {
        c if c < 0 => None,
        c if (c as usize) < part_count => Some(c as usize),
        c => return Err(rd.error(format!("counterpart {c} out of range"))),
    };
    let w = rd.weights(rows, cols)?;
    Ok(PartClassifier {
        w,
        x,
        y,
        z,
        dx,
        dy,
        dxx,
        dyy,
        alpha,
        counterpart,
    })
}

fn decode_model(rd: &mut TokenReader<'_>) -> Result<(ModelState, MixtureModel)> {
    let (state, stored) = match rd.token("sentinel")? {
        "." => {
            let n = rd.items("component count", COMPONENT_MIN_TOKENS)?;
            (ModelState::Complete, n)
        }
        "," => {
            let count = rd.count("component count")?;
            let initialized = rd.items("initialized count", COMPONENT_MIN_TOKENS)?;
            if initialized > count {
                return Err(rd.error("more initialized components than components"));
            }
            (ModelState::InProgress { count }, initialized)
        }
        other => return Err(rd.error(format!("unknown sentinel `{other}`"))),
    };
    let mut roots = Vec::with_capacity(stored);
    for _ in 0..stored {
        let rows = rd.count("root rows")?;
        let cols = rd.count("root cols")?;
        let beta = rd.real("beta")? as f32;
        let mut alpha = [0.0f32; 3];
        for a in &mut alpha {
            *a = rd.real("root alpha")? as f32;
        }
        let w = rd.weights(rows, cols)?;
        let part_count = rd.items("part count", PART_MIN_TOKENS)?;
        let mut parts = Vec::with_capacity(part_count);
        for _ in 0..part_count {
            parts.push(decode_part(rd, part_count)?);
        }
        roots.push(RootClassifier {
            w,
            beta,
            alpha,
            parts,
        });
    }
    if !rd.is_done() {
        return Err(rd.error("trailing data after last component"));
    }
    Ok((state, MixtureModel { roots }))
}

/// Read a final model or a training checkpoint.
pub fn read_model_file(path: &Path) -> Result<(ModelState, MixtureModel)> {
    let text = fs::read_to_string(path).map_err(|e| DpmError::io(path, e))?;
    let mut rd = TokenReader::new(path, &text);
    decode_model(&mut rd)
}
