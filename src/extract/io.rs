//! Feature vector cache files.
//!
//! A vector is written as
//!
//! ```text
//! <id> <rows> <cols>
//! <root weights, one line per row>
//! <part count> <score>
//! per part:
//!   <dx> <dy> <dxx> <dyy>
//!   <x> <y> <z>
//!   <rows> <cols>
//!   <part weights, one line per row>
//! ```
//!
//! with `0 0 0` standing for "no vector". The positive cache starts with the
//! slot count, the negative cache with `<cache size> <count>`. Only what
//! training needs is stored; placement and scale are not.
use super::{FeatureVector, PartVector};
use crate::error::{DpmError, Result};
use crate::features::FEATURE_CHANNELS;
use crate::model::hexfloat::format_hex;
use crate::model::io::{write_atomically, TokenReader};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

// An empty slot, and the header of a part with an empty filter.
const VECTOR_MIN_TOKENS: usize = 3;
const PART_MIN_TOKENS: usize = 9;

fn push_rows(out: &mut String, data: &[f32], cols: usize) {
    let per_row = (cols * FEATURE_CHANNELS).max(1);
    for row in data.chunks(per_row) {
        for &v in row {
            out.push_str(&format_hex(v as f64));
            out.push(' ');
        }
        out.push('\n');
    }
}

pub(crate) fn encode_vector(out: &mut String, v: Option<&FeatureVector>) {
    let Some(v) = v else {
        out.push_str("0 0 0\n");
        return;
    };
    let _ = writeln!(out, "{} {} {}", v.id, v.root.rows, v.root.cols);
    push_rows(out, &v.root.data, v.root.cols);
    let _ = writeln!(out, "{} {}", v.parts.len(), format_hex(v.score as f64));
    for p in &v.parts {
        let _ = writeln!(
            out,
            "{} {} {} {}",
            format_hex(p.dx),
            format_hex(p.dy),
            format_hex(p.dxx),
            format_hex(p.dyy)
        );
        let _ = writeln!(out, "{} {} {}", p.x, p.y, p.z);
        let _ = writeln!(out, "{} {}", p.w.rows, p.w.cols);
        push_rows(out, &p.w.data, p.w.cols);
    }
}

pub(crate) fn decode_vector(rd: &mut TokenReader<'_>) -> Result<Option<FeatureVector>> {
    let id = rd.count("vector id")?;
    let rows = rd.count("root rows")?;
    let cols = rd.count("root cols")?;
    if rows == 0 && cols == 0 {
        return Ok(None);
    }
    let root = rd.weights(rows, cols)?;
    let count = rd.items("part count", PART_MIN_TOKENS)?;
    let score = rd.real("score")? as f32;
    let mut parts = Vec::with_capacity(count);
    for _ in 0..count {
        let dx = rd.real("dx")?;
        let dy = rd.real("dy")?;
        let dxx = rd.real("dxx")?;
        let dyy = rd.real("dyy")?;
        let x = rd.int("part x")? as i32;
        let y = rd.int("part y")? as i32;
        let z = rd.int("part z")? as i32;
        let prows = rd.count("part rows")?;
        let pcols = rd.count("part cols")?;
        let w = rd.weights(prows, pcols)?;
        parts.push(PartVector {
            w,
            x,
            y,
            z,
            dx,
            dy,
            dxx,
            dyy,
        });
    }
    let mut v = FeatureVector::from_root(id, root);
    v.score = score;
    v.parts = parts;
    Ok(Some(v))
}

/// Write one slot per positive example.
pub fn write_positive_vectors(path: &Path, vectors: &[Option<FeatureVector>]) -> Result<()> {
    let mut out = String::new();
    let _ = writeln!(out, "{}", vectors.len());
    for v in vectors {
        encode_vector(&mut out, v.as_ref());
    }
    write_atomically(path, &out)
}

/// Read the positive cache; `Ok(None)` when absent. The slot count must be
/// `expected`.
pub fn read_positive_vectors(path: &Path, expected: usize) -> Result<Option<Vec<Option<FeatureVector>>>> {
    let Some(text) = read_optional(path)? else {
        return Ok(None);
    };
    let mut rd = TokenReader::new(path, &text);
    let n = rd.items("positive count", VECTOR_MIN_TOKENS)?;
    if n != expected {
        return Err(rd.error(format!("cache holds {n} positives, expected {expected}")));
    }
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(decode_vector(&mut rd)?);
    }
    Ok(Some(out))
}

pub fn write_negative_vectors(path: &Path, vectors: &[FeatureVector], cache_size: usize) -> Result<()> {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", cache_size, vectors.len());
    for v in vectors {
        encode_vector(&mut out, Some(v));
    }
    write_atomically(path, &out)
}

/// Read the negative cache; `Ok(None)` when absent. The recorded cache size
/// must match `cache_size`.
pub fn read_negative_vectors(path: &Path, cache_size: usize) -> Result<Option<Vec<FeatureVector>>> {
    let Some(text) = read_optional(path)? else {
        return Ok(None);
    };
    let mut rd = TokenReader::new(path, &text);
    let stored = rd.count("cache size")?;
    if stored != cache_size {
        return Err(rd.error(format!(
            "cache was written for size {stored}, expected {cache_size}"
        )));
    }
    let n = rd.items("negative count", VECTOR_MIN_TOKENS)?;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        match decode_vector(&mut rd)? {
            Some(v) => out.push(v),
            None => return Err(rd.error("empty slot in negative cache")),
        }
    }
    Ok(Some(out))
}

pub(crate) fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DpmError::io(path, e)),
    }
}
