//! Scores collected answers against every loaded model.
//!
//! Failures are contained per model: the failing model reports the fallback
//! score with the error attached and the remaining models are still scored.

use crate::assembler::{assemble, FeatureVector};
use crate::collector::Selections;
use crate::error::PredictError;
use crate::models::loader::LoadedModel;
use crate::models::registry::ModelSlot;
use crate::types::report::ScoreResult;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Runs each model's probability estimate and converts it to a score.
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    /// Per-model estimation budget, enforced by the async scoring methods
    timeout: Option<Duration>,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each async estimate by `timeout`.
    ///
    /// A blocking estimate cannot be cancelled. On timeout the caller gets the
    /// fallback immediately while the estimate finishes detached on the
    /// blocking pool; a model that serializes calls stays busy until then.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Score every model in order, synchronously.
    pub fn score_all(&self, models: &[LoadedModel], selections: &Selections) -> Vec<ScoreResult> {
        models
            .iter()
            .map(|model| self.score_model(model, selections))
            .collect()
    }

    /// Score one model. Never fails: errors become the fallback score.
    pub fn score_model(&self, model: &LoadedModel, selections: &Selections) -> ScoreResult {
        let start = Instant::now();
        let outcome = prepare(model, selections).and_then(|row| estimate(model, &row));
        finish(model, outcome, start)
    }

    /// Score every configured slot in order. A model that never loaded
    /// reports the fallback with its load error.
    pub fn score_slots(&self, slots: &[ModelSlot], selections: &Selections) -> Vec<ScoreResult> {
        slots
            .iter()
            .map(|slot| match slot {
                ModelSlot::Ready(model) => self.score_model(model, selections),
                ModelSlot::Unavailable { label, error } => unavailable(label, error),
            })
            .collect()
    }

    /// Score every model in order, running each estimate on the blocking
    /// pool under the configured timeout. A panicking or slow model falls
    /// back like any other failure.
    pub async fn score_all_async(
        &self,
        models: &[LoadedModel],
        selections: &Selections,
    ) -> Vec<ScoreResult> {
        let mut results = Vec::with_capacity(models.len());
        for model in models {
            results.push(self.score_model_async(model, selections).await);
        }
        results
    }

    /// Async counterpart of [`Scorer::score_slots`].
    pub async fn score_slots_async(
        &self,
        slots: &[ModelSlot],
        selections: &Selections,
    ) -> Vec<ScoreResult> {
        let mut results = Vec::with_capacity(slots.len());
        for slot in slots {
            let result = match slot {
                ModelSlot::Ready(model) => self.score_model_async(model, selections).await,
                ModelSlot::Unavailable { label, error } => unavailable(label, error),
            };
            results.push(result);
        }
        results
    }

    async fn score_model_async(&self, model: &LoadedModel, selections: &Selections) -> ScoreResult {
        let start = Instant::now();
        let outcome = match prepare(model, selections) {
            Ok(row) => self.estimate_detached(model, row).await,
            Err(e) => Err(e),
        };
        finish(model, outcome, start)
    }

    async fn estimate_detached(
        &self,
        model: &LoadedModel,
        row: FeatureVector,
    ) -> Result<f64, PredictError> {
        let task_model = model.clone();
        let task = tokio::task::spawn_blocking(move || estimate(&task_model, &row));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(PredictError::Timeout {
                        model: model.label.clone(),
                        after: limit,
                    })
                }
            },
            None => task.await,
        };

        joined.map_err(|e| PredictError::estimation(&model.label, format!("estimation task failed: {}", e)))?
    }
}

/// Build the model's input row in its own feature order.
fn prepare(model: &LoadedModel, selections: &Selections) -> Result<FeatureVector, PredictError> {
    let row = assemble(&model.label, selections, model.feature_names())?;
    debug!(model = %model.label, width = row.len(), "Feature row assembled");
    Ok(row)
}

/// Positive-class probability for one row.
fn estimate(model: &LoadedModel, row: &FeatureVector) -> Result<f64, PredictError> {
    model
        .model
        .predict_proba(row)
        .and_then(|probs| probs.positive())
        .map_err(|e| PredictError::estimation(&model.label, e.to_string()))
}

fn unavailable(label: &str, error: &PredictError) -> ScoreResult {
    debug!(model = %label, error = %error, "Model not loaded, reporting fallback");
    ScoreResult::fallback(label, error)
}

fn finish(model: &LoadedModel, outcome: Result<f64, PredictError>, start: Instant) -> ScoreResult {
    let latency_us = start.elapsed().as_micros() as u64;
    match outcome {
        Ok(probability) => {
            let result = ScoreResult::genuine(&model.label, probability).with_latency_us(latency_us);
            debug!(
                model = %model.label,
                probability = probability,
                score = result.score,
                latency_us = latency_us,
                "Model scored"
            );
            result
        }
        Err(e) => {
            match e {
                PredictError::SchemaMismatch { .. } => {
                    warn!(model = %model.label, error = %e, "Answers do not cover model inputs")
                }
                _ => error!(model = %model.label, error = %e, "Model inference failed"),
            }
            ScoreResult::fallback(&model.label, &e).with_latency_us(latency_us)
        }
    }
}
