//! Prediction result data structures

use crate::error::PredictError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score substituted when a model cannot produce a genuine estimate.
pub const FALLBACK_SCORE: u8 = 50;

/// Why a score is a fallback rather than a model estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackNote {
    /// Error kind, e.g. `estimation_failure`
    pub kind: String,
    /// Human-readable cause, shown next to the score
    pub message: String,
}

impl From<&PredictError> for FallbackNote {
    fn from(err: &PredictError) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Similarity score for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Model label
    pub label: String,

    /// Positive-class probability; absent on fallback
    pub probability: Option<f64>,

    /// Displayed score, 0-100
    pub score: u8,

    /// Set when `score` is the fallback value
    pub fallback: Option<FallbackNote>,

    /// Time spent in this model, microseconds
    pub latency_us: u64,
}

impl ScoreResult {
    pub fn genuine(label: impl Into<String>, probability: f64) -> Self {
        Self {
            label: label.into(),
            probability: Some(probability),
            score: scale_probability(probability),
            fallback: None,
            latency_us: 0,
        }
    }

    pub fn fallback(label: impl Into<String>, err: &PredictError) -> Self {
        Self {
            label: label.into(),
            probability: None,
            score: FALLBACK_SCORE,
            fallback: Some(err.into()),
            latency_us: 0,
        }
    }

    pub fn with_latency_us(mut self, latency_us: u64) -> Self {
        self.latency_us = latency_us;
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Scale a probability to a whole-number score in 0..=100.
///
/// Halves round to even, matching how the score has always been displayed.
pub fn scale_probability(probability: f64) -> u8 {
    let scaled = (probability.clamp(0.0, 1.0) * 100.0).round_ties_even();
    scaled.clamp(0.0, 100.0) as u8
}

/// Everything shown for one press of "Predict".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionReport {
    pub prediction_id: String,
    pub generated_at: DateTime<Utc>,
    pub results: Vec<ScoreResult>,
    /// True when any score is a fallback or the model set is incomplete
    pub degraded: bool,
}

impl PredictionReport {
    pub fn new(results: Vec<ScoreResult>) -> Self {
        let degraded = results.iter().any(ScoreResult::is_fallback);
        Self {
            prediction_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            results,
            degraded,
        }
    }

    /// Mark the report degraded regardless of individual results.
    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded |= degraded;
        self
    }

    pub fn fallback_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_fallback()).count()
    }
}
