//! One prediction request: assemble rows, score every model, report.

use crate::collector::Selections;
use crate::metrics::ServiceMetrics;
use crate::models::{ModelRegistry, Scorer};
use crate::schema::FeatureSchema;
use crate::types::report::{PredictionReport, ScoreResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Request-scoped entry point over the shared registry.
#[derive(Clone)]
pub struct Predictor {
    registry: Arc<ModelRegistry>,
    scorer: Scorer,
    metrics: Arc<ServiceMetrics>,
}

impl Predictor {
    pub fn new(registry: Arc<ModelRegistry>, scorer: Scorer, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            registry,
            scorer,
            metrics,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.registry.schema()
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Score `selections` against every configured model.
    ///
    /// Always yields a report; failing or unloaded models carry the fallback
    /// score.
    pub async fn predict(&self, selections: &Selections) -> PredictionReport {
        let start = Instant::now();
        debug!(answers = selections.len(), "Scoring request");

        let results = self
            .scorer
            .score_slots_async(self.registry.slots(), selections)
            .await;

        self.finish(results, start)
    }

    /// Synchronous variant for callers outside a runtime.
    pub fn predict_blocking(&self, selections: &Selections) -> PredictionReport {
        let start = Instant::now();
        let results = self.scorer.score_slots(self.registry.slots(), selections);
        self.finish(results, start)
    }

    fn finish(&self, results: Vec<ScoreResult>, start: Instant) -> PredictionReport {
        let report = PredictionReport::new(results).with_degraded(self.registry.is_degraded());
        let elapsed = start.elapsed();
        self.metrics.record_prediction(&report, elapsed);

        info!(
            prediction_id = %report.prediction_id,
            models = report.results.len(),
            fallbacks = report.fallback_count(),
            degraded = report.degraded,
            processing_time_us = elapsed.as_micros(),
            "Prediction complete"
        );
        report
    }
}
