//! Latent relabelling and hard-negative mining with parts.
//!
//! Relabel round `c` fixes every positive's latent placement (best
//! placement overlapping its box). Mining round `d` then prunes the
//! negative cache to the examples still inside the margin, refills it from
//! background images with the current model, and runs SGD epochs over the
//! fixed positives and the cache. Progress `(c, d)`, both caches and the
//! model are checkpointed so an interrupted run picks up at the same round.
use super::checkpoint::{remove_if_exists, write_checkpoint, write_progress, CheckpointPaths};
use super::sgd::{descend_component, vector_score, Loss, PassConfig};
use super::{report_symmetry, ImageSource, TrainParams, TrainingData, MINI_BATCH, REGQ, STREAM_DESCENT, STREAM_MINING};
use crate::diagnostics::{ProgressSink, TrainEvent};
use crate::error::Result;
use crate::extract::io::{read_negative_vectors, read_positive_vectors, write_negative_vectors, write_positive_vectors};
use crate::extract::{collect_all, collect_best, FeatureVector};
use crate::model::MixtureModel;
use crate::rng::{RandomSource, SeededRng};

/// Best placement of every positive under `model`, `None` where no
/// placement overlaps the box enough.
pub fn collect_positives(
    source: &dyn ImageSource,
    data: &TrainingData,
    model: &MixtureModel,
    params: &TrainParams,
) -> Result<Vec<Option<FeatureVector>>> {
    let mut out = Vec::with_capacity(data.positives.len());
    for (path, &bbox) in data.positives.iter().zip(&data.bboxes) {
        let image = source.load(path, params.grayscale)?;
        out.push(collect_best(
            &image,
            model,
            bbox,
            params.include_overlap,
            params.detector.interval,
        ));
    }
    Ok(out)
}

/// Top up `cache` with placements scoring above zero on background images
/// visited in random order, stopping once it holds `cache_size` vectors.
pub fn collect_from_background(
    cache: &mut Vec<FeatureVector>,
    rng: &mut dyn RandomSource,
    source: &dyn ImageSource,
    data: &TrainingData,
    model: &MixtureModel,
    params: &TrainParams,
) -> Result<()> {
    let mut order: Vec<usize> = (0..data.backgrounds.len()).collect();
    rng.shuffle(&mut order);
    for i in order {
        let image = source.load(&data.backgrounds[i], params.grayscale)?;
        if let Some(found) = collect_all(rng, &image, model, params.detector.interval, 0.0) {
            cache.extend(found);
        }
        log::debug!(
            "negatives collected {}%",
            cache.len() * 100 / params.negative_cache_size.max(1)
        );
        if cache.len() >= params.negative_cache_size {
            break;
        }
    }
    Ok(())
}

/// Sorted scores of the positives of component `id` (all components when
/// `None`).
fn positive_scores(model: &MixtureModel, positives: &[Option<FeatureVector>], id: Option<usize>) -> Result<Vec<f64>> {
    let mut scores = Vec::new();
    for v in positives.iter().flatten() {
        if id.map_or(true, |k| v.id == k) {
            scores.push(vector_score(model, v)?);
        }
    }
    scores.sort_by(f64::total_cmp);
    Ok(scores)
}

fn percentile_index(len: usize, percentile: f64) -> usize {
    ((percentile * len as f64) as usize).min(len.saturating_sub(1))
}

/// Shift component `id`'s bias so its positive at `percentile` scores zero.
/// Returns the change, or `None` when the component has no positives.
pub fn adjust_model_constant(
    model: &mut MixtureModel,
    id: usize,
    positives: &[Option<FeatureVector>],
    percentile: f64,
) -> Result<Option<f64>> {
    let scores = positive_scores(model, positives, Some(id))?;
    if scores.is_empty() {
        return Ok(None);
    }
    let adjust = scores[percentile_index(scores.len(), percentile)] as f32;
    model.roots[id].beta -= adjust;
    Ok(Some(-(adjust as f64)))
}

fn per_component(vectors: impl Iterator<Item = usize>, count: usize) -> Vec<usize> {
    let mut out = vec![0; count];
    for id in vectors {
        if id < count {
            out[id] += 1;
        }
    }
    out
}

/// Run the relabel/mining rounds from the checkpointed position.
pub fn relabel_and_mine(
    mut model: MixtureModel,
    source: &dyn ImageSource,
    data: &TrainingData,
    params: &TrainParams,
    paths: &CheckpointPaths,
    sink: &mut dyn ProgressSink,
) -> Result<MixtureModel> {
    let count = model.len();
    let posnum = data.positives.len();
    let cache_size = params.negative_cache_size;
    let mut negatives = read_negative_vectors(&paths.negatives, cache_size)?;
    if let Some(cached) = &negatives {
        log::info!("read {} cached negatives", cached.len());
    }
    let (mut c, mut d) = match super::checkpoint::read_progress(&paths.progress)? {
        Some((c, d)) => {
            sink.emit(&TrainEvent::Resumed { relabel: c, round: d });
            (c, d)
        }
        None => (0, 0),
    };

    while c < params.relabels {
        let positives = match read_positive_vectors(&paths.positives, posnum)? {
            Some(cached) => cached,
            None => {
                let fresh = collect_positives(source, data, &model, params)?;
                write_positive_vectors(&paths.positives, &fresh)?;
                fresh
            }
        };
        let pos_count = per_component(positives.iter().flatten().map(|v| v.id), count);
        for (component, &n) in pos_count.iter().enumerate() {
            sink.emit(&TrainEvent::PositivesCollected { component, count: n });
        }

        while d < params.data_minings {
            write_progress(&paths.progress, c, d)?;
            sink.emit(&TrainEvent::ProgressSaved { relabel: c, round: d });

            let mut cache = Vec::new();
            for v in negatives.take().unwrap_or_default() {
                if vector_score(&model, &v)? >= -1.0 {
                    cache.push(v);
                }
            }
            let retained = cache.len();
            if cache.len() < cache_size {
                let mut rng = SeededRng::derived(params.seed, &[STREAM_MINING, c as u64, d as u64]);
                collect_from_background(&mut cache, &mut rng, source, data, &model, params)?;
            }
            write_negative_vectors(&paths.negatives, &cache, cache_size)?;
            sink.emit(&TrainEvent::NegativesMined {
                relabel: c,
                round: d,
                retained,
                total: cache.len(),
            });
            let neg_count = per_component(cache.iter().map(|v| v.id), count);

            if cache.len() <= (cache_size / 2).max(REGQ.max(MINI_BATCH)) {
                log::warn!(
                    "only {} hard negatives (cache {cache_size}); moving biases to the {} percentile",
                    cache.len(),
                    params.percentile_breakdown
                );
                for id in 0..count {
                    match adjust_model_constant(&mut model, id, &positives, params.percentile_breakdown)? {
                        Some(adjustment) => sink.emit(&TrainEvent::ConstantAdjusted {
                            component: id,
                            adjustment,
                        }),
                        None => log::warn!("component {id} has no positives to calibrate against"),
                    }
                }
                write_checkpoint(&paths.model, &model)?;
                negatives = Some(cache);
                d += 1;
                continue;
            }

            model = descend(model, &positives, &cache, &pos_count, &neg_count, params, (c, d), sink)?;

            write_checkpoint(&paths.model, &model)?;
            let scores = positive_scores(&model, &positives, None)?;
            if !scores.is_empty() {
                let mut breakdown = params.percentile_breakdown;
                while breakdown < 1.0 {
                    sink.emit(&TrainEvent::PercentileScore {
                        percentile: breakdown,
                        score: scores[percentile_index(scores.len(), breakdown)],
                    });
                    breakdown += params.percentile_breakdown;
                }
            }
            let snapshot = paths.round_model(c, d);
            write_checkpoint(&snapshot, &model)?;
            sink.emit(&TrainEvent::CheckpointSaved { path: snapshot });
            negatives = Some(cache);
            d += 1;
        }
        d = 0;
        remove_if_exists(&paths.positives)?;
        c += 1;
    }
    remove_if_exists(&paths.negatives)?;
    Ok(model)
}

/// SGD epochs of one mining round.
#[allow(clippy::too_many_arguments)]
fn descend(
    mut model: MixtureModel,
    positives: &[Option<FeatureVector>],
    negatives: &[FeatureVector],
    pos_count: &[usize],
    neg_count: &[usize],
    params: &TrainParams,
    (relabel, round): (usize, usize),
    sink: &mut dyn ProgressSink,
) -> Result<MixtureModel> {
    let count = model.len();
    let posnum = positives.len();
    let min_batch = REGQ.max(MINI_BATCH);
    let min_negatives = (params.negative_cache_size / (count * 3)).max(min_batch);
    let weights = |k: usize| {
        let (p, n) = (pos_count[k] as f64, neg_count[k] as f64);
        ((n / p * params.balance).sqrt(), (p / n / params.balance).sqrt())
    };
    let mut rng = SeededRng::derived(params.seed, &[STREAM_DESCENT, relabel as u64, round as u64]);
    let mut alpha = params.alpha;
    let mut previous = Loss::default();

    for t in 0..params.iterations {
        for p in 0..count {
            if neg_count[p] <= min_negatives || pos_count[p] <= min_batch {
                continue;
            }
            let (positive_weight, negative_weight) = weights(p);
            let mut order: Vec<usize> = (0..posnum + negatives.len()).collect();
            rng.shuffle(&mut order);
            let batch: Vec<(&FeatureVector, bool)> = order
                .iter()
                .filter_map(|&k| {
                    if k < posnum {
                        positives[k].as_ref().filter(|v| v.id == p).map(|v| (v, true))
                    } else {
                        Some(&negatives[k - posnum]).filter(|v| v.id == p).map(|v| (v, false))
                    }
                })
                .collect();
            let cfg = PassConfig {
                alpha,
                positive_weight,
                negative_weight,
                c: params.c,
                symmetric: params.symmetric,
                examples: pos_count[p] + neg_count[p],
            };
            model = descend_component(model, p, &batch, &cfg)?;
        }

        let loss = Loss::measure(
            &model,
            positives.iter().flatten(),
            negatives.iter(),
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
            round,
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
                round,
                iteration: t,
            });
            break;
        }
        previous = loss;
        alpha *= params.alpha_ratio;
    }
    Ok(model)
}
