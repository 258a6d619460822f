//! Part filters carved from the up-sampled root filter.
//!
//! Parts are placed greedily: each step picks the rectangle of roughly
//! `area / parts` cells with the highest mean absolute weight, copies it as
//! a part filter and clears it so later parts do not overlap. With symmetry
//! on, a rectangle is either centred on the vertical axis or lies in the
//! left half and gets a mirrored counterpart.
use crate::features::FeatureMap;
use crate::model::{PartClassifier, RootClassifier};

#[derive(Clone, Copy, Debug, PartialEq)]
struct Placement {
    y: usize,
    x: usize,
    rows: usize,
    cols: usize,
    paired: bool,
    energy: f64,
}

fn mean_energy(w: &FeatureMap, y: usize, x: usize, rows: usize, cols: usize) -> f64 {
    let mut sum = 0.0f64;
    for yy in y..y + rows {
        for xx in x..x + cols {
            sum += w.cell(yy, xx).iter().map(|v| v.abs() as f64).sum::<f64>();
        }
    }
    sum / (rows * cols) as f64
}

fn best_placement(w: &FeatureMap, area: f64, symmetric: bool, can_pair: bool) -> Option<Placement> {
    let mut best: Option<Placement> = None;
    let mut consider = |y: usize, x: usize, rows: usize, cols: usize, paired: bool| {
        let energy = mean_energy(w, y, x, rows, cols);
        if best.map_or(true, |b| energy > b.energy) {
            best = Some(Placement {
                y,
                x,
                rows,
                cols,
                paired,
                energy,
            });
        }
    };
    let mut rows = 1;
    while (rows as f64) < area + 1.0 && rows * 3 <= w.rows * 2 {
        let cols = (area / rows as f64 + 0.5) as usize;
        let usable = cols >= 1 && cols * 3 <= w.cols * 2 && rows <= cols * 2 && cols <= rows * 2;
        if usable {
            if symmetric {
                if cols % 2 == w.cols % 2 {
                    let x = (w.cols - cols) / 2;
                    for y in 0..=w.rows - rows {
                        consider(y, x, rows, cols, false);
                    }
                }
                if can_pair && cols <= w.cols / 2 {
                    for y in 0..=w.rows - rows {
                        for x in 0..=w.cols / 2 - cols {
                            consider(y, x, rows, cols, true);
                        }
                    }
                }
            } else {
                for y in 0..=w.rows - rows {
                    for x in 0..=w.cols - cols {
                        consider(y, x, rows, cols, false);
                    }
                }
            }
        }
        rows += 1;
    }
    best
}

/// Give `root` up to `parts` part filters; returns how many were placed.
pub fn initialize_parts(root: &mut RootClassifier, parts: usize, symmetric: bool) -> usize {
    let mut w = root.w.sample_up();
    let area = (w.rows * w.cols) as f64 / parts as f64;
    root.parts.clear();
    while root.parts.len() < parts {
        let i = root.parts.len();
        let Some(p) = best_placement(&w, area, symmetric, i + 1 < parts) else {
            log::warn!("no room for part {} of {parts} in a {}x{} root", i + 1, w.rows, w.cols);
            break;
        };
        log::info!(
            "part {}/{parts}: {}x{} at ({}, {}), energy {:.4}",
            i + 1,
            p.cols,
            p.rows,
            p.x,
            p.y,
            p.energy
        );
        root.parts.push(PartClassifier::new(
            w.window(p.y as i64, p.x as i64, p.rows, p.cols),
            p.x as i32,
            p.y as i32,
        ));
        w.zero_region(p.y, p.x, p.rows, p.cols);
        if symmetric && p.paired {
            let x = w.cols - (p.x + p.cols);
            log::info!("part {}/{parts}: mirror at ({x}, {})", i + 2, p.y);
            let mut mirror = PartClassifier::new(w.window(p.y as i64, x as i64, p.rows, p.cols), x as i32, p.y as i32);
            w.zero_region(p.y, x, p.rows, p.cols);
            mirror.counterpart = Some(i);
            root.parts[i].counterpart = Some(i + 1);
            root.parts.push(mirror);
        }
    }
    root.parts.len()
}
