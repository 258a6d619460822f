//! Structured training progress.
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStage {
    RootInit,
    RootOptimize,
    PartInit,
    Mining,
    Regression,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrainEvent {
    StageStarted {
        stage: TrainStage,
    },
    /// A stage found its result on disk and was skipped.
    StageSkipped {
        stage: TrainStage,
    },
    PositivesCollected {
        component: usize,
        count: usize,
    },
    NegativesCollected {
        count: usize,
    },
    RootInitialized {
        component: usize,
        beta: f32,
    },
    PartsInitialized {
        component: usize,
        parts: usize,
    },
    /// One pass of stochastic gradient descent.
    Epoch {
        relabel: usize,
        round: usize,
        iteration: usize,
        loss: f64,
        positive_loss: f64,
        negative_loss: f64,
        alpha: f64,
    },
    /// Negative cache after pruning and mining.
    NegativesMined {
        relabel: usize,
        round: usize,
        retained: usize,
        total: usize,
    },
    ConstantAdjusted {
        component: usize,
        adjustment: f64,
    },
    /// Positive score at one step of the percentile breakdown.
    PercentileScore {
        percentile: f64,
        score: f64,
    },
    /// Loss stopped changing; remaining iterations of the round are skipped.
    Converged {
        relabel: usize,
        round: usize,
        iteration: usize,
    },
    SymmetryViolation {
        component: usize,
        y: usize,
        x: usize,
        channel: usize,
        magnitude: f32,
    },
    ProgressSaved {
        relabel: usize,
        round: usize,
    },
    CheckpointSaved {
        path: PathBuf,
    },
    Resumed {
        relabel: usize,
        round: usize,
    },
    RegressionFitted {
        component: usize,
        examples: usize,
    },
    Finished {
        components: usize,
    },
}

/// Receiver of training progress. Sinks observe; they never steer training.
pub trait ProgressSink {
    fn emit(&mut self, event: &TrainEvent);
}

/// Forwards events to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&mut self, event: &TrainEvent) {
        match event {
            TrainEvent::Epoch {
                relabel,
                round,
                iteration,
                loss,
                positive_loss,
                negative_loss,
                alpha,
            } => log::debug!(
                "train epoch c={relabel} d={round} t={iteration} loss={loss:.6} pos={positive_loss:.6} neg={negative_loss:.6} alpha={alpha:.6}"
            ),
            TrainEvent::CheckpointSaved { path } => {
                log::debug!("train checkpoint {}", path.display())
            }
            TrainEvent::SymmetryViolation {
                component,
                y,
                x,
                channel,
                magnitude,
            } => log::warn!(
                "component {component} root not symmetric at ({y}, {x}, {channel}) by {magnitude}"
            ),
            other => match serde_json::to_string(other) {
                Ok(json) => log::info!("train {json}"),
                Err(_) => log::info!("train {other:?}"),
            },
        }
    }
}

/// Keeps every event in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<TrainEvent>,
}

impl ProgressSink for RecordingSink {
    fn emit(&mut self, event: &TrainEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&TrainEvent::StageStarted {
            stage: TrainStage::PartInit,
        })
        .unwrap();
        assert_eq!(json, r#"{"event":"stage_started","stage":"part_init"}"#);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::default();
        sink.emit(&TrainEvent::Finished { components: 2 });
        sink.emit(&TrainEvent::NegativesCollected { count: 5 });
        assert_eq!(sink.events.len(), 2);
        assert_eq!(sink.events[0], TrainEvent::Finished { components: 2 });
    }
}
