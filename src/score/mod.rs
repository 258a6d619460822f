//! Component scoring over one pyramid level.
//!
//! [`compute_score`] produces the root response of a component at a level,
//! reduced by the best deformed response of every part evaluated on the
//! level one octave finer. The per-part distance-transform outputs are kept
//! so detection and example collection can recover where each part landed.

pub mod convolve;
pub mod distance;

use crate::features::FeatureMap;
use crate::image::ImageF32;
use crate::model::{PartClassifier, RootClassifier};
use distance::{distance_transform, DisplacementMap};
use std::ops::Range;

pub use convolve::filter;

/// Extent of a filter and the offsets of its reference cell.
///
/// A response at `(y, x)` belongs to the window whose top-left cell is
/// `(y - half_rows, x - half_cols)`; `half + tail + 1` spans the filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub rows: usize,
    pub cols: usize,
    pub half_rows: usize,
    pub half_cols: usize,
    pub tail_rows: usize,
    pub tail_cols: usize,
}

impl Window {
    pub fn of(w: &FeatureMap) -> Self {
        Self {
            rows: w.rows,
            cols: w.cols,
            half_rows: w.rows.saturating_sub(1) / 2,
            half_cols: w.cols.saturating_sub(1) / 2,
            tail_rows: w.rows / 2,
            tail_cols: w.cols / 2,
        }
    }

    /// Rows of a `map_rows`-tall response where the window fits.
    pub fn row_range(&self, map_rows: usize) -> Range<usize> {
        self.half_rows..map_rows.saturating_sub(self.tail_rows).max(self.half_rows)
    }

    pub fn col_range(&self, map_cols: usize) -> Range<usize> {
        self.half_cols..map_cols.saturating_sub(self.tail_cols).max(self.half_cols)
    }
}

/// Clamp that tolerates `hi < lo` (returns `lo` below, `hi` above).
#[inline]
fn clamp_loose(v: i64, lo: i64, hi: i64) -> i64 {
    if v < lo {
        lo
    } else if v > hi {
        hi
    } else {
        v
    }
}

/// Cell of the part response map that anchors `part` when the root sits at
/// `(x, y)` of its own response map. Returns `(ix, iy)`.
pub fn part_anchor(
    part: &PartClassifier,
    root: &Window,
    part_map: (usize, usize),
    x: usize,
    y: usize,
) -> (usize, usize) {
    let (map_cols, map_rows) = part_map;
    let pw = Window::of(&part.w);
    let offy = part.y as i64 + pw.half_rows as i64 - root.half_rows as i64 * 2;
    let offx = part.x as i64 + pw.half_cols as i64 - root.half_cols as i64 * 2;
    let iy = clamp_loose(
        y as i64 * 2 + offy,
        pw.half_rows as i64,
        map_rows as i64 - pw.rows as i64 + pw.half_rows as i64,
    );
    let ix = clamp_loose(
        x as i64 * 2 + offx,
        pw.half_cols as i64,
        map_cols as i64 - pw.cols as i64 + pw.half_cols as i64,
    );
    // only reachable on maps smaller than the part filter
    let iy = iy.clamp(0, map_rows.saturating_sub(1) as i64) as usize;
    let ix = ix.clamp(0, map_cols.saturating_sub(1) as i64) as usize;
    (ix, iy)
}

/// Distance-transformed response of one part.
#[derive(Clone, Debug)]
pub struct PartScore {
    /// Negated deformed response: `-response[iy][ix]` is the part's
    /// contribution when anchored at `(ix, iy)`.
    pub response: ImageF32,
    pub displacement: DisplacementMap,
}

#[derive(Clone, Debug)]
pub struct ComponentScore {
    /// Root response with the part contributions folded in (no bias).
    pub root: ImageF32,
    /// One entry per part; empty when no finer level was supplied.
    pub parts: Vec<PartScore>,
}

/// Score `root` over `level`, adding its parts over `level_2x` when given.
pub fn compute_score(
    root: &RootClassifier,
    level: &FeatureMap,
    level_2x: Option<&FeatureMap>,
) -> ComponentScore {
    let mut response = filter(level, &root.w);
    let Some(fine) = level_2x else {
        return ComponentScore {
            root: response,
            parts: Vec::new(),
        };
    };
    let win = root.window();
    let ys = win.row_range(level.rows);
    let xs = win.col_range(level.cols);
    let mut parts = Vec::with_capacity(root.parts.len());
    for part in &root.parts {
        let part_response = filter(fine, &part.w);
        let (dt, displacement) = distance_transform(&part_response, &part.deformation(), true);
        if !dt.is_empty() {
            for y in ys.clone() {
                for x in xs.clone() {
                    let (ix, iy) = part_anchor(part, &win, (dt.w, dt.h), x, y);
                    let v = response.get(x, y) - dt.get(ix, iy);
                    response.set(x, y, v);
                }
            }
        }
        parts.push(PartScore {
            response: dt,
            displacement,
        });
    }
    ComponentScore {
        root: response,
        parts,
    }
}
