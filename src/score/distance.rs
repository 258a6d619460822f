//! Generalised distance transform with a quadratic deformation cost.
//!
//! For a response map `f` and deformation `(dx, dy, dxx, dyy)` the transform
//! computes, for every cell `p`,
//!
//! ```text
//! D(p) = min_q  s * f(q) + dx * rx + dxx * rx² + dy * ry + dyy * ry²,   (rx, ry) = p - q
//! ```
//!
//! where `s = -1` for the negated variant used by part scoring (so `-D(p)` is
//! the best deformed part response) and `s = 1` otherwise. The minimising
//! displacement `(rx, ry)` is recorded per cell.
//!
//! The transform is separable: a pass along each row then along each column,
//! each solved in linear time with the lower envelope of shifted parabolas.
use crate::image::ImageF32;
use rayon::prelude::*;

/// Smallest quadratic coefficient the envelope solver accepts.
const MIN_QUADRATIC: f64 = 1e-6;

/// Linear and quadratic deformation coefficients of a part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deformation {
    pub dx: f64,
    pub dy: f64,
    pub dxx: f64,
    pub dyy: f64,
}

/// Per-cell argmin displacement `(rx, ry) = p - q`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplacementMap {
    pub w: usize,
    pub h: usize,
    pub dx: Vec<i32>,
    pub dy: Vec<i32>,
}

impl DisplacementMap {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> (i32, i32) {
        let i = y * self.w + x;
        (self.dx[i], self.dy[i])
    }
}

/// Minimise `f(q) + a * (p - q) + b * (p - q)²` for every `p`.
fn envelope_1d(f: &[f64], a: f64, b: f64, out: &mut [f64], arg: &mut [usize]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let b = b.max(MIN_QUADRATIC);
    // b (p - q)² + a (p - q) is a parabola in p centred at q - a / (2b).
    let shift = a / (2.0 * b);
    let site = |q: usize| q as f64 - shift;
    let height = |q: usize| f[q] + b * site(q) * site(q);

    let mut v = vec![0usize; n];
    let mut z = vec![0.0f64; n + 1];
    let mut k = 0usize;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let mut s = (height(q) - height(v[k])) / (2.0 * b * (q - v[k]) as f64);
        // z[0] is -inf, so k never underflows
        while s <= z[k] {
            k -= 1;
            s = (height(q) - height(v[k])) / (2.0 * b * (q - v[k]) as f64);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    let mut k = 0usize;
    for p in 0..n {
        while z[k + 1] < p as f64 {
            k += 1;
        }
        let q = v[k];
        let d = p as f64 - q as f64;
        out[p] = f[q] + a * d + b * d * d;
        arg[p] = q;
    }
}

/// Distance transform of a single-channel map.
pub fn distance_transform(
    src: &ImageF32,
    cost: &Deformation,
    negate: bool,
) -> (ImageF32, DisplacementMap) {
    let (w, h) = (src.w, src.h);
    let sign = if negate { -1.0 } else { 1.0 };
    let mut out = ImageF32::new(w, h);
    let mut disp = DisplacementMap {
        w,
        h,
        dx: vec![0; w * h],
        dy: vec![0; w * h],
    };
    if w == 0 || h == 0 {
        return (out, disp);
    }

    // rows
    let row_pass: Vec<(Vec<f64>, Vec<usize>)> = (0..h)
        .into_par_iter()
        .map(|y| {
            let f: Vec<f64> = (0..w).map(|x| sign * src.get(x, y) as f64).collect();
            let mut vals = vec![0.0; w];
            let mut arg = vec![0usize; w];
            envelope_1d(&f, cost.dx, cost.dxx, &mut vals, &mut arg);
            (vals, arg)
        })
        .collect();

    // columns
    let col_pass: Vec<(Vec<f64>, Vec<usize>)> = (0..w)
        .into_par_iter()
        .map(|x| {
            let f: Vec<f64> = (0..h).map(|y| row_pass[y].0[x]).collect();
            let mut vals = vec![0.0; h];
            let mut arg = vec![0usize; h];
            envelope_1d(&f, cost.dy, cost.dyy, &mut vals, &mut arg);
            (vals, arg)
        })
        .collect();

    for (x, (vals, args)) in col_pass.iter().enumerate() {
        for y in 0..h {
            let qy = args[y];
            let qx = row_pass[qy].1[x];
            out.set(x, y, vals[y] as f32);
            let i = y * w + x;
            disp.dx[i] = x as i32 - qx as i32;
            disp.dy[i] = y as i32 - qy as i32;
        }
    }
    (out, disp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(src: &ImageF32, c: &Deformation, negate: bool) -> Vec<f64> {
        let sign = if negate { -1.0 } else { 1.0 };
        let mut out = Vec::new();
        for py in 0..src.h {
            for px in 0..src.w {
                let mut best = f64::INFINITY;
                for qy in 0..src.h {
                    for qx in 0..src.w {
                        let rx = px as f64 - qx as f64;
                        let ry = py as f64 - qy as f64;
                        let v = sign * src.get(qx, qy) as f64
                            + c.dx * rx
                            + c.dxx * rx * rx
                            + c.dy * ry
                            + c.dyy * ry * ry;
                        best = best.min(v);
                    }
                }
                out.push(best);
            }
        }
        out
    }

    fn bumpy(w: usize, h: usize) -> ImageF32 {
        let data = (0..w * h)
            .map(|i| (((i * 29) % 13) as f32 - 6.0) * 0.7)
            .collect();
        ImageF32::from_vec(w, h, 1, data)
    }

    #[test]
    fn matches_brute_force_minimum() {
        let src = bumpy(9, 7);
        for cost in [
            Deformation { dx: 0.0, dy: 0.0, dxx: 0.1, dyy: 0.1 },
            Deformation { dx: 0.3, dy: -0.2, dxx: 0.05, dyy: 0.4 },
            Deformation { dx: -1.5, dy: 0.9, dxx: 1.0, dyy: 0.01 },
        ] {
            for negate in [false, true] {
                let (out, _) = distance_transform(&src, &cost, negate);
                let expected = brute_force(&src, &cost, negate);
                for (i, (a, b)) in out.data.iter().zip(&expected).enumerate() {
                    assert!((*a as f64 - b).abs() < 1e-3, "cell {i}: {a} vs {b} ({cost:?})");
                }
            }
        }
    }

    #[test]
    fn displacement_reproduces_the_minimum() {
        let src = bumpy(8, 6);
        let cost = Deformation { dx: 0.2, dy: 0.1, dxx: 0.3, dyy: 0.2 };
        let (out, disp) = distance_transform(&src, &cost, true);
        for y in 0..6 {
            for x in 0..8 {
                let (rx, ry) = disp.get(x, y);
                let qx = (x as i32 - rx) as usize;
                let qy = (y as i32 - ry) as usize;
                let (rx, ry) = (rx as f64, ry as f64);
                let v = -(src.get(qx, qy) as f64)
                    + cost.dx * rx
                    + cost.dxx * rx * rx
                    + cost.dy * ry
                    + cost.dyy * ry * ry;
                assert!((out.get(x, y) as f64 - v).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn stiff_cost_keeps_parts_in_place() {
        let src = bumpy(5, 5);
        let cost = Deformation { dx: 0.0, dy: 0.0, dxx: 1e3, dyy: 1e3 };
        let (out, disp) = distance_transform(&src, &cost, false);
        assert!(disp.dx.iter().chain(&disp.dy).all(|&d| d == 0));
        assert_eq!(out.data, src.data);
    }
}
