//! Logistic regression artifacts

use crate::assembler::FeatureVector;
use crate::error::PredictError;
use crate::models::{check_width, sigmoid, ClassProbabilities, EstimationError, Model};
use serde::{Deserialize, Serialize};

/// Binary logistic regression: `p = sigmoid(intercept + coefficients . x)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn new(feature_names: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            feature_names,
            coefficients,
            intercept,
        }
    }

    /// Check the artifact is self-consistent.
    pub fn validate(&self) -> Result<(), PredictError> {
        if self.feature_names.is_empty() {
            return Err(PredictError::invalid_artifact("logistic model has no features"));
        }
        if self.coefficients.len() != self.feature_names.len() {
            return Err(PredictError::invalid_artifact(format!(
                "logistic model has {} coefficients for {} features",
                self.coefficients.len(),
                self.feature_names.len()
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(PredictError::invalid_artifact(
                "logistic model has non-finite parameters",
            ));
        }
        Ok(())
    }

    fn decision(&self, row: &[f64]) -> f64 {
        self.coefficients
            .iter()
            .zip(row)
            .fold(self.intercept, |acc, (w, x)| acc + w * x)
    }
}

impl Model for LogisticModel {
    fn kind(&self) -> &'static str {
        "logistic"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &FeatureVector) -> Result<ClassProbabilities, EstimationError> {
        check_width(self.feature_names.len(), row)?;
        let z = self.decision(row.values());
        if !z.is_finite() {
            return Err(EstimationError::Runtime(format!(
                "non-finite decision value {}",
                z
            )));
        }
        Ok(ClassProbabilities::binary(sigmoid(z)))
    }
}
