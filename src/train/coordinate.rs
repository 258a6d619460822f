//! Root-only mixture optimisation.
//!
//! Alternates latent relabelling (each positive goes to the component that
//! scores its warped window highest, each negative to a random component)
//! with epochs of SGD over the relabelled windows.
use super::sgd::{descend_component, vector_score, Loss, PassConfig};
use super::{report_symmetry, TrainParams, STREAM_ROOT_OPTIMIZE};
use crate::diagnostics::{ProgressSink, TrainEvent};
use crate::error::Result;
use crate::extract::FeatureVector;
use crate::model::MixtureModel;
use crate::rng::{RandomSource, SeededRng};

/// `positives[k][i]` / `negatives[k][i]` hold example `i` warped to
/// component `k`'s root shape.
pub fn optimize_root_mixture(
    mut model: MixtureModel,
    positives: &[Vec<Option<FeatureVector>>],
    negatives: &[Vec<FeatureVector>],
    params: &TrainParams,
    sink: &mut dyn ProgressSink,
) -> Result<MixtureModel> {
    let count = model.len();
    let posnum = positives.first().map_or(0, Vec::len);
    let negnum = negatives.first().map_or(0, Vec::len);

    for relabel in 0..params.root_relabels {
        let mut rng = SeededRng::derived(params.seed, &[STREAM_ROOT_OPTIMIZE, relabel as u64]);

        let mut labels: Vec<Option<usize>> = Vec::with_capacity(posnum + negnum);
        let mut pos_count = vec![0usize; count];
        for i in 0..posnum {
            let mut best: Option<(usize, f64)> = None;
            for (k, examples) in positives.iter().enumerate() {
                let Some(v) = &examples[i] else { continue };
                let score = vector_score(&model, v)?;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((k, score));
                }
            }
            if let Some((k, _)) = best {
                pos_count[k] += 1;
            }
            labels.push(best.map(|(k, _)| k));
        }
        let mut neg_count = vec![0usize; count];
        for _ in 0..negnum {
            let k = rng.uniform_int(count);
            neg_count[k] += 1;
            labels.push(Some(k));
        }
        log::info!("root relabel {relabel}: positives per component {pos_count:?}, negatives {neg_count:?}");

        let example = |i: usize| match labels[i] {
            None => None,
            Some(k) if i < posnum => positives[k][i].as_ref().map(|v| (v, true)),
            Some(k) => Some((&negatives[k][i - posnum], false)),
        };
        let weights = |k: usize| {
            let (p, n) = (pos_count[k] as f64, neg_count[k] as f64);
            ((n / p * params.balance).sqrt(), (p / n / params.balance).sqrt())
        };

        let mut alpha = params.alpha;
        let mut previous = Loss::default();
        for t in 0..params.iterations {
            let mut order: Vec<usize> = (0..posnum + negnum).collect();
            rng.shuffle(&mut order);
            for j in 0..count {
                if pos_count[j] == 0 || neg_count[j] == 0 {
                    continue;
                }
                let (positive_weight, negative_weight) = weights(j);
                let batch: Vec<(&FeatureVector, bool)> = order
                    .iter()
                    .filter(|&&i| labels[i] == Some(j))
                    .filter_map(|&i| example(i))
                    .collect();
                let cfg = PassConfig {
                    alpha,
                    positive_weight,
                    negative_weight,
                    c: params.c,
                    symmetric: params.symmetric,
                    examples: pos_count[j] + neg_count[j],
                };
                model = descend_component(model, j, &batch, &cfg)?;
            }

            let labelled = |range: std::ops::Range<usize>| {
                range.filter_map(|i| example(i).map(|(v, _)| v)).collect::<Vec<_>>()
            };
            let loss = Loss::measure(
                &model,
                labelled(0..posnum).into_iter(),
                labelled(posnum..posnum + negnum).into_iter(),
                |k, positive| {
                    let (pw, nw) = weights(k);
                    if positive {
                        pw
                    } else {
                        nw
                    }
                },
            )?;
            sink.emit(&TrainEvent::Epoch {
                relabel,
                round: 0,
                iteration: t,
                loss: loss.total,
                positive_loss: loss.positive,
                negative_loss: loss.negative,
                alpha,
            });
            if params.symmetric {
                report_symmetry(&model, sink);
            }
            if loss.converged(&previous) {
                sink.emit(&TrainEvent::Converged {
                    relabel,
                    round: 0,
                    iteration: t,
                });
                break;
            }
            previous = loss;
            alpha *= params.alpha_ratio;
        }
    }
    Ok(model)
}
