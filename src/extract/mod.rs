//! Feature vectors: the HOG windows a component saw at one placement.
//!
//! A [`FeatureVector`] mirrors the layout of a [`RootClassifier`]: the root
//! window copied from the scanned level plus, per part, the window at the
//! part's chosen displacement on the finer level and the displacement
//! features `(rx, ry, rx², ry²)`. Its score under a model is then a plain
//! dot product, which is what latent SVM training optimises.

pub mod io;

use crate::features::FeatureMap;
use crate::image::ImageF32;
use crate::model::{MixtureModel, RootClassifier};
use crate::pyramid::{scale_upto, FeaturePyramid, WINDOW_SIZE};
use crate::rng::RandomSource;
use crate::score::{compute_score, part_anchor, PartScore};
use crate::types::Rect;

/// Part half of a feature vector.
#[derive(Clone, Debug, PartialEq)]
pub struct PartVector {
    pub w: FeatureMap,
    /// Anchor copied from the part classifier.
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Displacement features `rx`, `ry`, `rx²`, `ry²`.
    pub dx: f64,
    pub dy: f64,
    pub dxx: f64,
    pub dyy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector {
    /// Component index.
    pub id: usize,
    pub root: FeatureMap,
    /// Detection score (response plus bias) when collected.
    pub score: f32,
    /// Root response cell the vector was collected at.
    pub x: i32,
    pub y: i32,
    /// Level scale relative to the input image.
    pub scale_x: f64,
    pub scale_y: f64,
    pub parts: Vec<PartVector>,
}

impl FeatureVector {
    /// Zeroed vector shaped like component `id`.
    pub fn for_component(root: &RootClassifier, id: usize) -> Self {
        Self {
            id,
            root: FeatureMap::zeros(root.w.rows, root.w.cols),
            score: 0.0,
            x: 0,
            y: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            parts: root
                .parts
                .iter()
                .map(|p| PartVector {
                    w: FeatureMap::zeros(p.w.rows, p.w.cols),
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    dx: 0.0,
                    dy: 0.0,
                    dxx: 0.0,
                    dyy: 0.0,
                })
                .collect(),
        }
    }

    /// Root-only vector, as produced when warping training windows.
    pub fn from_root(id: usize, root: FeatureMap) -> Self {
        Self {
            id,
            root,
            score: 0.0,
            x: 0,
            y: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            parts: Vec::new(),
        }
    }
}

/// Copy the windows component `id` used at root cell `(x, y)` of `level`.
#[allow(clippy::too_many_arguments)]
pub fn collect_feature_vector(
    root: &RootClassifier,
    id: usize,
    score: f32,
    x: usize,
    y: usize,
    level: &FeatureMap,
    fine: &FeatureMap,
    parts: &[PartScore],
) -> FeatureVector {
    let mut v = FeatureVector::for_component(root, id);
    v.score = score;
    v.x = x as i32;
    v.y = y as i32;
    let win = root.window();
    v.root = level.window(
        y as i64 - win.half_rows as i64,
        x as i64 - win.half_cols as i64,
        win.rows,
        win.cols,
    );
    for ((part, ps), pv) in root.parts.iter().zip(parts).zip(&mut v.parts) {
        let (ix, iy) = part_anchor(part, &win, (ps.response.w, ps.response.h), x, y);
        let (rx, ry) = ps.displacement.get(ix, iy);
        pv.dx = rx as f64;
        pv.dy = ry as f64;
        pv.dxx = (rx * rx) as f64;
        pv.dyy = (ry * ry) as f64;
        let pw = crate::score::Window::of(&part.w);
        let top = iy as i64 - ry as i64 - pw.half_rows as i64;
        let left = ix as i64 - rx as i64 - pw.half_cols as i64;
        pv.w = fine.window(top, left, pw.rows, pw.cols);
    }
    v
}

fn build_pyramid(image: &ImageF32, model: &MixtureModel, interval: usize) -> Option<FeaturePyramid> {
    let upto = scale_upto(image, &[model], interval);
    if upto < 0 {
        return None;
    }
    Some(FeaturePyramid::build(image, interval, upto as usize))
}

/// Highest-scoring placement of any component whose window overlaps `bbox`
/// by at least `overlap` (intersection over the larger area). `None` when
/// the image is too small or nothing qualifies.
pub fn collect_best(
    image: &ImageF32,
    model: &MixtureModel,
    bbox: Rect,
    overlap: f64,
    interval: usize,
) -> Option<FeatureVector> {
    let pyr = build_pyramid(image, model, interval)?;
    let bbox_area = bbox.area() as f64;
    let mut best = f32::MIN;
    let mut found: Option<FeatureVector> = None;

    for (id, root) in model.roots.iter().enumerate() {
        let win = root.window();
        let (mut scale_x, mut scale_y) = (1.0f64, 1.0f64);
        for j in pyr.root_levels() {
            let size_w = (win.cols as f64 * WINDOW_SIZE as f64 * scale_x + 0.5) as i32;
            let size_h = (win.rows as f64 * WINDOW_SIZE as f64 * scale_y + 0.5) as i32;
            let size_area = size_w as f64 * size_h as f64;
            if size_area.min(bbox_area) / size_area.max(bbox_area) < overlap {
                scale_x *= pyr.scale;
                scale_y *= pyr.scale;
                continue;
            }
            let (level, fine) = pyr.level_pair(j);
            let score = compute_score(root, level, Some(fine));
            for y in win.row_range(level.rows) {
                for x in win.col_range(level.cols) {
                    let f = score.root.get(x, y);
                    if f <= best {
                        continue;
                    }
                    let rect = Rect::new(
                        ((x - win.half_cols) as f64 * WINDOW_SIZE as f64 * scale_x + 0.5) as i32,
                        ((y - win.half_rows) as f64 * WINDOW_SIZE as f64 * scale_y + 0.5) as i32,
                        size_w,
                        size_h,
                    );
                    let inter = rect.intersection_area(&bbox) as f64;
                    if inter / rect.area().max(bbox.area()) as f64 >= overlap {
                        let mut v = collect_feature_vector(
                            root,
                            id,
                            f + root.beta,
                            x,
                            y,
                            level,
                            fine,
                            &score.parts,
                        );
                        v.scale_x = scale_x;
                        v.scale_y = scale_y;
                        found = Some(v);
                        best = f;
                    }
                }
            }
            scale_x *= pyr.scale;
            scale_y *= pyr.scale;
        }
    }
    found
}

/// Every placement scoring above `threshold`, visiting components in random
/// order and taking up to `64 / components` vectors per component. `None`
/// when the image is too small for the model.
pub fn collect_all(
    rng: &mut dyn RandomSource,
    image: &ImageF32,
    model: &MixtureModel,
    interval: usize,
    threshold: f32,
) -> Option<Vec<FeatureVector>> {
    let pyr = build_pyramid(image, model, interval)?;
    let enough = 64 / model.roots.len().max(1);
    let mut order: Vec<usize> = (0..model.roots.len()).collect();
    rng.shuffle(&mut order);

    let mut out = Vec::new();
    for (i, &id) in order.iter().enumerate() {
        let root = &model.roots[id];
        let win = root.window();
        let quota = enough * (i + 1);
        let (mut scale_x, mut scale_y) = (1.0f64, 1.0f64);
        'levels: for j in pyr.root_levels() {
            let (level, fine) = pyr.level_pair(j);
            let score = compute_score(root, level, Some(fine));
            for y in win.row_range(level.rows) {
                for x in win.col_range(level.cols) {
                    let f = score.root.get(x, y);
                    if f + root.beta > threshold {
                        let mut v = collect_feature_vector(
                            root,
                            id,
                            f + root.beta,
                            x,
                            y,
                            level,
                            fine,
                            &score.parts,
                        );
                        v.scale_x = scale_x;
                        v.scale_y = scale_y;
                        out.push(v);
                        if out.len() >= quota {
                            break 'levels;
                        }
                    }
                }
            }
            scale_x *= pyr.scale;
            scale_y *= pyr.scale;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_CHANNELS;
    use crate::model::PartClassifier;
    use crate::rng::SeededRng;

    fn textured(w: usize, h: usize) -> ImageF32 {
        let data = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                (((x * 7 + y * 13) % 29) as f32) * 8.0
            })
            .collect();
        ImageF32::from_vec(w, h, 1, data)
    }

    fn model_with_part() -> MixtureModel {
        let w = FeatureMap::from_vec(
            3,
            3,
            (0..9 * FEATURE_CHANNELS).map(|i| ((i % 7) as f32 - 3.0) * 0.01).collect(),
        );
        let mut root = RootClassifier::new(w, -0.2);
        root.parts.push(PartClassifier::new(
            FeatureMap::from_vec(2, 2, vec![0.02; 4 * FEATURE_CHANNELS]),
            1,
            1,
        ));
        MixtureModel::new(vec![root])
    }

    #[test]
    fn collected_vector_reproduces_its_score() {
        let model = model_with_part();
        let root = &model.roots[0];
        let img = textured(96, 96);
        let pyr = FeaturePyramid::build(&img, 2, 1);
        let j = pyr.next() + 1;
        let (level, fine) = pyr.level_pair(j);
        let score = compute_score(root, level, Some(fine));
        let (x, y) = (4, 5);
        let f = score.root.get(x, y);
        let v = collect_feature_vector(root, 0, f + root.beta, x, y, level, fine, &score.parts);

        let p = &root.parts[0];
        let pv = &v.parts[0];
        let dot = root.w.dot(&v.root) + p.w.dot(&pv.w)
            - (p.dx * pv.dx + p.dxx * pv.dxx + p.dy * pv.dy + p.dyy * pv.dyy);
        assert!((dot - f as f64).abs() < 1e-3, "{dot} vs {f}");
        assert_eq!((pv.x, pv.y, pv.z), (1, 1, 1));
        assert_eq!(pv.dxx, pv.dx * pv.dx);
    }

    #[test]
    fn collect_best_respects_overlap() {
        let model = model_with_part();
        let img = textured(128, 128);
        let bbox = Rect::new(30, 30, 24, 24);
        let v = collect_best(&img, &model, bbox, 0.5, 3).expect("a qualifying window");
        let size = (3.0 * 8.0 * v.scale_x + 0.5) as i32;
        let rect = Rect::new(
            ((v.x - 1) as f64 * 8.0 * v.scale_x + 0.5) as i32,
            ((v.y - 1) as f64 * 8.0 * v.scale_y + 0.5) as i32,
            size,
            size,
        );
        let ratio = rect.intersection_area(&bbox) as f64 / rect.area().max(bbox.area()) as f64;
        assert!(ratio >= 0.5, "overlap {ratio}");
    }

    #[test]
    fn too_small_image_yields_nothing() {
        let model = model_with_part();
        let img = textured(20, 20);
        let mut rng = SeededRng::new(1);
        assert!(collect_all(&mut rng, &img, &model, 3, 0.0).is_none());
        assert!(collect_best(&img, &model, Rect::new(0, 0, 20, 20), 0.5, 3).is_none());
    }

    #[test]
    fn collect_all_honours_threshold_and_quota() {
        let mut model = model_with_part();
        model.roots[0].beta = 100.0;
        let img = textured(96, 96);
        let mut rng = SeededRng::new(9);
        let all = collect_all(&mut rng, &img, &model, 2, 0.0).unwrap();
        assert_eq!(all.len(), 64);
        assert!(all.iter().all(|v| v.score > 0.0 && v.id == 0));

        model.roots[0].beta = -100.0;
        let none = collect_all(&mut rng, &img, &model, 2, 0.0).unwrap();
        assert!(none.is_empty());
    }
}
