//! Training windows for root initialisation.
//!
//! Positives are grouped into components by aspect ratio. Every component
//! gets a root shape derived from the group's mean aspect and a common
//! target area; each positive box is then re-centred to that aspect and
//! warped to the root's pixel size. Negatives are random windows from the
//! background images, one aligned sub-window per component.
use super::{ImageSource, TrainingData};
use crate::error::{DpmError, Result};
use crate::extract::FeatureVector;
use crate::features::hog;
use crate::image::resample::{resample_area, sample_up, slice};
use crate::image::ImageF32;
use crate::pyramid::WINDOW_SIZE;
use crate::rng::RandomSource;
use crate::types::Rect;

/// Root geometry of every component and the component of every positive.
#[derive(Clone, Debug, PartialEq)]
pub struct ComponentLayout {
    /// Component of each positive, in input order.
    pub labels: Vec<usize>,
    /// Positives per component.
    pub counts: Vec<usize>,
    /// Root filter `(rows, cols)` in cells.
    pub shapes: Vec<(usize, usize)>,
}

fn mean_variance(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let n = values.clone().count().max(1) as f64;
    let mean = values.clone().sum::<f64>() / n;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    (mean, variance)
}

impl ComponentLayout {
    /// Split `bboxes` into `components` groups of consecutive aspect ratio
    /// (widest first) and size each group's root.
    pub fn from_boxes(bboxes: &[Rect], components: usize, min_area: i64, max_area: i64) -> Self {
        let n = bboxes.len();
        let mut by_aspect: Vec<(f32, usize)> = bboxes
            .iter()
            .enumerate()
            .map(|(i, b)| (b.width as f32 / b.height as f32, i))
            .collect();
        by_aspect.sort_by(|a, b| b.0.total_cmp(&a.0));

        let (mean, variance) = mean_variance(by_aspect.iter().map(|a| a.0 as f64));
        log::info!("aspect ratio of {n} positives: mean {mean:.4}, variance {variance:.4}");

        let mut areas: Vec<i64> = bboxes.iter().map(Rect::area).collect();
        areas.sort_unstable();
        let area = areas
            .get((n as f64 * 0.2 + 0.5) as usize)
            .copied()
            .unwrap_or(min_area)
            .clamp(min_area, max_area);

        let mut labels = vec![0; n];
        let mut counts = Vec::with_capacity(components);
        let mut shapes = Vec::with_capacity(components);
        let mut remaining = n;
        let mut start = 0;
        for i in 0..components {
            let count = ((remaining as f64 / (components - i) as f64 + 0.5) as usize).min(remaining);
            let group = &by_aspect[start..start + count];
            let (aspect, variance) = mean_variance(group.iter().map(|a| a.0 as f64));
            for &(_, idx) in group {
                labels[idx] = i;
            }
            let side = ((area as f64 / aspect) as f32).sqrt() as f64;
            let cols = ((side * aspect / WINDOW_SIZE as f64 + 0.5) as i64).max(1) as usize;
            let rows = ((side / WINDOW_SIZE as f64 + 0.5) as i64).max(1) as usize;
            log::info!(
                "component {i}: {count} positives, aspect {aspect:.4} (variance {variance:.4}), root {rows}x{cols} cells"
            );
            counts.push(count);
            shapes.push((rows, cols));
            remaining -= count;
            start += count;
        }
        Self {
            labels,
            counts,
            shapes,
        }
    }
}

/// Warp `bbox` of `image` to a `rows x cols` root window. `None` when the
/// box, re-centred to the root's aspect, is less than half the window.
pub fn warp_positive(image: &ImageF32, bbox: Rect, rows: usize, cols: usize) -> Option<ImageF32> {
    let area = bbox.width as f64 * bbox.height as f64;
    let mcols = ((area * cols as f64 / rows as f64).sqrt() as f32 + 0.5) as i32;
    let mrows = ((area * rows as f64 / cols as f64).sqrt() as f32 + 0.5) as i32;
    let x = bbox.x + (bbox.width - mcols) / 2;
    let y = bbox.y + (bbox.height - mrows) / 2;
    let (win_w, win_h) = ((cols * WINDOW_SIZE) as i32, (rows * WINDOW_SIZE) as i32);
    if mcols * 2 < win_w || mrows * 2 < win_h {
        return None;
    }
    let up = sample_up(image);
    let patch = slice(
        &up,
        x as i64 * 2,
        y as i64 * 2,
        mcols as usize * 2,
        mrows as usize * 2,
    );
    Some(resample_area(&patch, win_w as usize, win_h as usize))
}

/// Warped root windows of every positive for every component, indexed
/// `[component][positive]`.
pub fn summon_positives(
    source: &dyn ImageSource,
    data: &TrainingData,
    shapes: &[(usize, usize)],
    grayscale: bool,
) -> Result<Vec<Vec<Option<FeatureVector>>>> {
    let mut out: Vec<Vec<Option<FeatureVector>>> =
        shapes.iter().map(|_| Vec::with_capacity(data.positives.len())).collect();
    for (i, (path, &bbox)) in data.positives.iter().zip(&data.bboxes).enumerate() {
        let image = source.load(path, grayscale)?;
        for (id, &(rows, cols)) in shapes.iter().enumerate() {
            let v = warp_positive(&image, bbox, rows, cols)
                .map(|win| FeatureVector::from_root(id, hog(&win, WINDOW_SIZE)));
            out[id].push(v);
        }
        log::debug!("summoned positive {}/{}", i + 1, data.positives.len());
    }
    Ok(out)
}

/// Draw random background windows until `count` negatives exist for every
/// component. Each image is visited with probability `count / images` per
/// pass; one random window of the largest root size is cut per visit.
pub fn collect_random_negatives(
    rng: &mut dyn RandomSource,
    source: &dyn ImageSource,
    backgrounds: &[std::path::PathBuf],
    count: usize,
    shapes: &[(usize, usize)],
    grayscale: bool,
) -> Result<Vec<Vec<FeatureVector>>> {
    let mut out: Vec<Vec<FeatureVector>> = shapes.iter().map(|_| Vec::with_capacity(count)).collect();
    let max_rows = shapes.iter().map(|s| s.0).max().unwrap_or(1);
    let max_cols = shapes.iter().map(|s| s.1).max().unwrap_or(1);
    let (win_w, win_h) = (max_cols * WINDOW_SIZE, max_rows * WINDOW_SIZE);
    let p = count as f64 / backgrounds.len().max(1) as f64;
    // Per image: unknown until loaded, then whether a window fits.
    let mut fits: Vec<Option<bool>> = vec![None; backgrounds.len()];

    while out[0].len() < count {
        if fits.iter().all(|f| *f == Some(false)) {
            return Err(DpmError::Corrupted(format!(
                "no background image holds a {win_w}x{win_h} window"
            )));
        }
        for (i, path) in backgrounds.iter().enumerate() {
            if rng.uniform() >= p {
                continue;
            }
            let image = source.load(path, grayscale)?;
            let fit = image.w >= win_w && image.h >= win_h;
            fits[i] = Some(fit);
            if !fit {
                continue;
            }
            let y = rng.uniform_int(image.h - win_h + 1);
            let x = rng.uniform_int(image.w - win_w + 1);
            for (id, &(rows, cols)) in shapes.iter().enumerate() {
                let oy = y + ((max_rows - rows) * WINDOW_SIZE + 1) / 2;
                let ox = x + ((max_cols - cols) * WINDOW_SIZE + 1) / 2;
                let win = slice(&image, ox as i64, oy as i64, cols * WINDOW_SIZE, rows * WINDOW_SIZE);
                out[id].push(FeatureVector::from_root(id, hog(&win, WINDOW_SIZE)));
            }
            if out[0].len() >= count {
                break;
            }
        }
        log::debug!("random negatives {}/{count}", out[0].len());
    }
    Ok(out)
}
