//! Stochastic sub-gradient descent on the latent SVM objective.
//!
//! For a fixed latent assignment the score of a feature vector is linear in
//! the model, so a hinge-violating example (`y·score < 1`) moves the weights
//! by `α·y·C·φ`. With symmetry on, the mirrored example contributes too and
//! part updates are shared with the counterpart part. Weight decay is
//! applied in batches of [`REGQ`] examples, and the model used to score
//! examples is refreshed from the updated copy every [`MINI_BATCH`]
//! examples.
use super::{MINI_BATCH, REGQ};
use crate::error::{DpmError, Result};
use crate::extract::FeatureVector;
use crate::features::FeatureMap;
use crate::model::{MixtureModel, PartClassifier};

/// Lower bound of the quadratic deformation costs.
pub const MIN_QUADRATIC_COST: f64 = 0.01;

/// Score of `v` under its component: bias, root and part responses minus
/// the deformation cost of the recorded displacements.
pub fn vector_score(model: &MixtureModel, v: &FeatureVector) -> Result<f64> {
    let root = model
        .roots
        .get(v.id)
        .ok_or_else(|| DpmError::Corrupted(format!("vector of component {} in a {}-component model", v.id, model.len())))?;
    if v.parts.len() != root.parts.len() || v.root.len() != root.w.len() {
        return Err(DpmError::Corrupted(format!(
            "vector shape disagrees with component {} ({} parts, expected {})",
            v.id,
            v.parts.len(),
            root.parts.len()
        )));
    }
    let mut score = root.beta as f64 + root.w.dot(&v.root);
    for (part, pv) in root.parts.iter().zip(&v.parts) {
        if pv.w.len() != part.w.len() {
            return Err(DpmError::Corrupted(format!("part window shape mismatch in component {}", v.id)));
        }
        score -= part.dx * pv.dx;
        score -= part.dxx * pv.dxx;
        score -= part.dy * pv.dy;
        score -= part.dyy * pv.dyy;
        score += part.w.dot(&pv.w);
    }
    if score.is_nan() {
        return Err(DpmError::Corrupted(format!("NaN score for component {}", v.id)));
    }
    Ok(score)
}

fn step_deformation(part: &mut PartClassifier, s: f64, pv: &crate::extract::PartVector, flip_x: bool) {
    if flip_x {
        part.dx += s * pv.dx;
    } else {
        part.dx -= s * pv.dx;
    }
    part.dxx = (part.dxx - s * pv.dxx).max(MIN_QUADRATIC_COST);
    part.dy -= s * pv.dy;
    part.dyy = (part.dyy - s * pv.dyy).max(MIN_QUADRATIC_COST);
}

/// Move component `v.id` of `model` by `alpha·y·c·φ(v)`.
pub fn gradient_step(model: &mut MixtureModel, v: &FeatureVector, y: f64, alpha: f64, c: f64, symmetric: bool) {
    let Some(root) = model.roots.get_mut(v.id) else {
        return;
    };
    let s = alpha * y * c;
    root.w.add_scaled(&v.root, s);
    if symmetric {
        root.w.add_scaled(&v.root.mirrored(), s);
        root.beta = (root.beta as f64 + s * 2.0) as f32;
    } else {
        root.beta = (root.beta as f64 + s) as f32;
    }
    for (k, pv) in v.parts.iter().enumerate().take(root.parts.len()) {
        step_deformation(&mut root.parts[k], s, pv, false);
        if !symmetric {
            root.parts[k].w.add_scaled(&pv.w, s);
            continue;
        }
        match root.parts[k].counterpart {
            None => {
                let part = &mut root.parts[k];
                step_deformation(part, s, pv, true);
                part.w.add_scaled(&pv.w, s);
                part.w.add_scaled(&pv.w.mirrored(), s);
            }
            Some(o) => {
                root.parts[k].w.add_scaled(&pv.w, s);
                if let Some(other) = root.parts.get_mut(o) {
                    step_deformation(other, s, pv, true);
                    other.w.add_scaled(&pv.w.mirrored(), s);
                }
            }
        }
    }
}

fn decay(w: &mut FeatureMap, regz: f64) {
    for v in &mut w.data {
        *v = (*v as f64 - regz * *v as f64) as f32;
    }
}

/// Shrink every parameter of component `id` by the factor `1 - regz`,
/// keeping the quadratic costs at or above [`MIN_QUADRATIC_COST`].
pub fn regularize(model: &mut MixtureModel, id: usize, regz: f64) {
    let Some(root) = model.roots.get_mut(id) else {
        return;
    };
    decay(&mut root.w, regz);
    root.beta = (root.beta as f64 - regz * root.beta as f64) as f32;
    for part in &mut root.parts {
        decay(&mut part.w, regz);
        part.dx -= regz * part.dx;
        part.dxx -= regz * part.dxx;
        part.dy -= regz * part.dy;
        part.dyy -= regz * part.dyy;
        part.dxx = part.dxx.max(MIN_QUADRATIC_COST);
        part.dyy = part.dyy.max(MIN_QUADRATIC_COST);
    }
}

/// Decay rate equivalent to `steps` per-example decays of
/// `alpha / (examples · (1 + symmetric))`.
pub fn regularization_rate(alpha: f64, examples: usize, symmetric: bool, steps: usize) -> f64 {
    let per_example = alpha / (examples * if symmetric { 2 } else { 1 }) as f64;
    1.0 - (1.0 - per_example).powi(steps as i32)
}

/// Settings of one pass over a component's examples.
#[derive(Clone, Copy, Debug)]
pub struct PassConfig {
    pub alpha: f64,
    pub positive_weight: f64,
    pub negative_weight: f64,
    pub c: f64,
    pub symmetric: bool,
    /// Positives plus negatives of the component, for the decay rate.
    pub examples: usize,
}

/// One pass of component `id` over `batch` (already shuffled and filtered
/// to the component; `true` marks positives). Scores come from the model
/// as of the last mini-batch boundary, updates go to a working copy.
pub fn descend_component(
    model: MixtureModel,
    id: usize,
    batch: &[(&FeatureVector, bool)],
    cfg: &PassConfig,
) -> Result<MixtureModel> {
    let regq = regularization_rate(cfg.alpha, cfg.examples, cfg.symmetric, REGQ);
    let mut current = model;
    let mut next = current.clone();
    for (l, &(v, positive)) in batch.iter().enumerate() {
        let score = vector_score(&current, v)?;
        if positive {
            if score <= 1.0 {
                gradient_step(&mut next, v, 1.0, cfg.alpha * cfg.positive_weight, cfg.c, cfg.symmetric);
            }
        } else if score >= -1.0 {
            gradient_step(&mut next, v, -1.0, cfg.alpha * cfg.negative_weight, cfg.c, cfg.symmetric);
        }
        let seen = l + 1;
        if seen % REGQ == REGQ - 1 {
            regularize(&mut next, id, regq);
        }
        if seen % MINI_BATCH == MINI_BATCH - 1 {
            current = next;
            next = current.clone();
        }
    }
    let tail = ((cfg.examples % REGQ) + 1) % (REGQ + 1);
    regularize(
        &mut next,
        id,
        regularization_rate(cfg.alpha, cfg.examples, cfg.symmetric, tail),
    );
    Ok(next)
}

/// Averaged hinge losses of an epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Loss {
    /// Class-weighted hinge loss over all examples.
    pub total: f64,
    pub positive: f64,
    pub negative: f64,
}

impl Loss {
    /// `weight(id, positive)` gives the class weight of an example.
    pub fn measure<'a>(
        model: &MixtureModel,
        positives: impl Iterator<Item = &'a FeatureVector>,
        negatives: impl Iterator<Item = &'a FeatureVector>,
        weight: impl Fn(usize, bool) -> f64,
    ) -> Result<Loss> {
        let (mut total, mut positive, mut negative) = (0.0, 0.0, 0.0);
        let (mut npos, mut nneg) = (0usize, 0usize);
        for v in positives {
            let hinge = (1.0 - vector_score(model, v)?).max(0.0);
            positive += hinge;
            total += weight(v.id, true) * hinge;
            npos += 1;
        }
        for v in negatives {
            let hinge = (1.0 + vector_score(model, v)?).max(0.0);
            negative += hinge;
            total += weight(v.id, false) * hinge;
            nneg += 1;
        }
        Ok(Loss {
            total: total / (npos + nneg).max(1) as f64,
            positive: positive / npos.max(1) as f64,
            negative: negative / nneg.max(1) as f64,
        })
    }

    /// Both class losses moved by less than `1e-5`.
    pub fn converged(&self, previous: &Loss) -> bool {
        (previous.positive - self.positive).abs() < 1e-5 && (previous.negative - self.negative).abs() < 1e-5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::PartVector;
    use crate::model::RootClassifier;

    fn filled(rows: usize, cols: usize, v: f32) -> FeatureMap {
        FeatureMap::from_vec(rows, cols, vec![v; rows * cols * crate::features::FEATURE_CHANNELS])
    }

    fn model_with_part(counterpart: Option<usize>) -> MixtureModel {
        let mut root = RootClassifier::new(filled(1, 2, 0.0), 0.0);
        let mut part = PartClassifier::new(filled(1, 1, 0.0), 0, 0);
        part.counterpart = counterpart;
        root.parts.push(part);
        MixtureModel::new(vec![root])
    }

    fn vector(root: f32, part: f32, rx: f64) -> FeatureVector {
        let mut v = FeatureVector::from_root(0, filled(1, 2, root));
        v.parts.push(PartVector {
            w: filled(1, 1, part),
            x: 0,
            y: 0,
            z: 1,
            dx: rx,
            dy: 0.0,
            dxx: rx * rx,
            dyy: 0.0,
        });
        v
    }

    #[test]
    fn score_is_bias_plus_responses_minus_cost() {
        let mut model = model_with_part(None);
        model.roots[0].beta = 0.5;
        model.roots[0].w = filled(1, 2, 0.1);
        model.roots[0].parts[0].w = filled(1, 1, 0.2);
        let v = vector(1.0, 1.0, 2.0);
        let expected = 0.5 + 62.0 * 0.1 + 31.0 * 0.2 - 0.1 * 4.0;
        assert!((vector_score(&model, &v).unwrap() - expected).abs() < 1e-5);
    }

    #[test]
    fn mismatched_vectors_are_rejected() {
        let model = model_with_part(None);
        let mut v = vector(1.0, 1.0, 0.0);
        v.parts.clear();
        assert!(matches!(vector_score(&model, &v), Err(DpmError::Corrupted(_))));
        v.id = 3;
        assert!(vector_score(&model, &v).is_err());
    }

    #[test]
    fn quadratic_costs_never_drop_below_floor() {
        let mut model = model_with_part(None);
        let v = vector(0.0, 0.0, 30.0);
        for _ in 0..50 {
            gradient_step(&mut model, &v, 1.0, 0.5, 1.0, false);
            assert!(model.roots[0].parts[0].dxx >= MIN_QUADRATIC_COST);
            regularize(&mut model, 0, 0.9);
            assert!(model.roots[0].parts[0].dxx >= MIN_QUADRATIC_COST);
            assert!(model.roots[0].parts[0].dyy >= MIN_QUADRATIC_COST);
        }
    }

    #[test]
    fn symmetric_step_keeps_root_symmetric() {
        let mut model = model_with_part(None);
        let mut v = vector(0.0, 0.0, 1.0);
        v.root.cell_mut(0, 0)[5] = 1.0;
        gradient_step(&mut model, &v, 1.0, 1.0, 1.0, true);
        assert!(crate::features::is_symmetric(&model.roots[0].w));
        assert_eq!(model.roots[0].beta, 2.0);
        // Unpaired symmetric parts cancel the linear x cost.
        assert_eq!(model.roots[0].parts[0].dx, 0.0);
    }

    #[test]
    fn counterpart_receives_mirrored_update() {
        let mut root = RootClassifier::new(filled(1, 2, 0.0), 0.0);
        let mut a = PartClassifier::new(filled(1, 1, 0.0), 0, 0);
        let mut b = PartClassifier::new(filled(1, 1, 0.0), 1, 0);
        a.counterpart = Some(1);
        b.counterpart = Some(0);
        root.parts = vec![a, b];
        let mut model = MixtureModel::new(vec![root]);
        let mut v = FeatureVector::from_root(0, filled(1, 2, 0.0));
        let mut pw = filled(1, 1, 0.0);
        pw.cell_mut(0, 0)[0] = 1.0;
        for _ in 0..2 {
            v.parts.push(PartVector {
                w: pw.clone(),
                x: 0,
                y: 0,
                z: 1,
                dx: 1.0,
                dy: 0.0,
                dxx: 1.0,
                dyy: 0.0,
            });
        }
        v.parts[1].w = filled(1, 1, 0.0);
        v.parts[1].dx = 0.0;
        v.parts[1].dxx = 0.0;
        gradient_step(&mut model, &v, 1.0, 1.0, 1.0, true);
        let parts = &model.roots[0].parts;
        assert_eq!(parts[0].w.cell(0, 0)[0], 1.0);
        // Channel 0 mirrors to channel 2 on the partner, dx flips sign.
        assert_eq!(parts[1].w.cell(0, 0)[2], 1.0);
        assert_eq!(parts[0].dx, -1.0);
        assert_eq!(parts[1].dx, 1.0);
    }

    #[test]
    fn pass_pushes_scores_towards_labels() {
        let model = model_with_part(None);
        let pos = vector(1.0, 0.5, 0.0);
        let neg = vector(-1.0, -0.5, 0.0);
        let batch: Vec<(&FeatureVector, bool)> = (0..40).map(|i| if i % 2 == 0 { (&pos, true) } else { (&neg, false) }).collect();
        let cfg = PassConfig {
            alpha: 0.01,
            positive_weight: 1.0,
            negative_weight: 1.0,
            c: 1.0,
            symmetric: false,
            examples: 40,
        };
        let before = Loss::measure(&model, [&pos].into_iter(), [&neg].into_iter(), |_, _| 1.0).unwrap();
        let trained = descend_component(model, 0, &batch, &cfg).unwrap();
        let after = Loss::measure(&trained, [&pos].into_iter(), [&neg].into_iter(), |_, _| 1.0).unwrap();
        assert!(after.total < before.total, "{after:?} vs {before:?}");
        assert!(vector_score(&trained, &pos).unwrap() > vector_score(&trained, &neg).unwrap());
    }
}
