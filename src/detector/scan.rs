//! Dense scan of one model over a feature pyramid.
use super::{Detection, PartDetection};
use crate::model::MixtureModel;
use crate::pyramid::{FeaturePyramid, WINDOW_SIZE};
use crate::score::{compute_score, part_anchor, Window};
use crate::types::Rect;

const CELL: f64 = WINDOW_SIZE as f64;
const PART_CELL: f64 = (WINDOW_SIZE / 2) as f64;

/// Every placement of every component of `model` scoring above `threshold`,
/// with regressed root boxes and part boxes. Candidates carry `class_id`.
pub fn scan_model(
    pyr: &FeaturePyramid,
    model: &MixtureModel,
    class_id: i32,
    threshold: f32,
) -> Vec<Detection> {
    let mut out = Vec::new();
    let (mut scale_x, mut scale_y) = (1.0f64, 1.0f64);
    for i in pyr.root_levels() {
        let (level, fine) = pyr.level_pair(i);
        for root in model.roots.iter().filter(|r| r.is_initialized()) {
            let score = compute_score(root, level, Some(fine));
            let win = root.window();
            for y in win.row_range(level.rows) {
                for x in win.col_range(level.cols) {
                    let f = score.root.get(x, y);
                    if f + root.beta <= threshold {
                        continue;
                    }
                    let mut drift_x = root.alpha[0] as f64;
                    let mut drift_y = root.alpha[1] as f64;
                    let mut drift_scale = root.alpha[2] as f64;
                    let mut parts = Vec::with_capacity(root.parts.len());
                    for (part, ps) in root.parts.iter().zip(&score.parts) {
                        let pw = Window::of(&part.w);
                        let (ix, iy) =
                            part_anchor(part, &win, (ps.response.w, ps.response.h), x, y);
                        let (rx, ry) = ps.displacement.get(ix, iy);
                        let (frx, fry) = (rx as f64, ry as f64);
                        let a = &part.alpha;
                        drift_x += a[0] as f64 * frx + a[1] as f64 * fry;
                        drift_y += a[2] as f64 * frx + a[3] as f64 * fry;
                        drift_scale += a[4] as f64 * frx + a[5] as f64 * fry;
                        let px = ix as i64 - rx as i64 - pw.half_cols as i64;
                        let py = iy as i64 - ry as i64 - pw.half_rows as i64;
                        parts.push(PartDetection {
                            rect: Rect::new(
                                (px as f64 * PART_CELL * scale_x + 0.5) as i32,
                                (py as f64 * PART_CELL * scale_y + 0.5) as i32,
                                (pw.cols as f64 * PART_CELL * scale_x + 0.5) as i32,
                                (pw.rows as f64 * PART_CELL * scale_y + 0.5) as i32,
                            ),
                            class_id: class_id - 1,
                            confidence: -ps.response.get(ix, iy),
                        });
                    }
                    let grow = 1.0 + drift_scale;
                    let rect = Rect::new(
                        ((x as f64 + drift_x) * CELL * scale_x
                            - win.half_cols as f64 * CELL * scale_x * grow
                            + 0.5) as i32,
                        ((y as f64 + drift_y) * CELL * scale_y
                            - win.half_rows as f64 * CELL * scale_y * grow
                            + 0.5) as i32,
                        (win.cols as f64 * CELL * scale_x * grow + 0.5) as i32,
                        (win.rows as f64 * CELL * scale_y * grow + 0.5) as i32,
                    );
                    out.push(Detection {
                        rect,
                        class_id,
                        confidence: f + root.beta,
                        neighbors: 1,
                        parts,
                    });
                }
            }
        }
        scale_x *= pyr.scale;
        scale_y *= pyr.scale;
    }
    out
}
