//! Pre-trained classifiers and the scoring engine built on them.
//!
//! Every artifact kind is adapted to the [`Model`] trait: an ordered list of
//! input feature names plus a per-class probability estimate for one row.

pub mod inference;
pub mod linear;
pub mod loader;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod registry;
pub mod tree;

pub use inference::Scorer;
pub use linear::LogisticModel;
pub use loader::{LoadedModel, ModelLoader};
pub use registry::{ModelRegistry, ModelSlot};
pub use tree::TreeEnsemble;

use crate::assembler::FeatureVector;
use thiserror::Error;

/// Failure inside a single probability estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("model produced {0} class probabilities, need at least 2")]
    NotBinary(usize),

    #[error("positive-class probability {0} is not in [0, 1]")]
    OutOfRange(f64),

    #[error("{0}")]
    Runtime(String),
}

/// Per-class probability distribution, indexed by class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassProbabilities(Vec<f64>);

impl ClassProbabilities {
    pub fn new(probabilities: Vec<f64>) -> Self {
        Self(probabilities)
    }

    /// Two-class distribution from the positive-class probability.
    pub fn binary(positive: f64) -> Self {
        Self(vec![1.0 - positive, positive])
    }

    /// Probability mass of class 1.
    pub fn positive(&self) -> Result<f64, EstimationError> {
        let p = *self
            .0
            .get(1)
            .ok_or(EstimationError::NotBinary(self.0.len()))?;
        // Tolerate float noise at the bounds, reject anything else.
        if !p.is_finite() || !(-1e-9..=1.0 + 1e-9).contains(&p) {
            return Err(EstimationError::OutOfRange(p));
        }
        Ok(p.clamp(0.0, 1.0))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A loaded, immutable classifier.
///
/// Implementations must be safe to call from several requests at once.
pub trait Model: Send + Sync {
    /// Artifact kind, e.g. `logistic` or `tree_ensemble`.
    fn kind(&self) -> &'static str;

    /// Input features in training order.
    fn feature_names(&self) -> &[String];

    /// Estimate class probabilities for one row.
    fn predict_proba(&self, row: &FeatureVector) -> Result<ClassProbabilities, EstimationError>;
}

/// Reject rows whose width differs from the model's input.
pub(crate) fn check_width(expected: usize, row: &FeatureVector) -> Result<(), EstimationError> {
    if row.len() != expected {
        return Err(EstimationError::DimensionMismatch {
            expected,
            actual: row.len(),
        });
    }
    Ok(())
}

/// Numerically stable logistic function.
pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_class() {
        assert_eq!(ClassProbabilities::binary(0.25).positive(), Ok(0.25));
        assert_eq!(
            ClassProbabilities::new(vec![1.0]).positive(),
            Err(EstimationError::NotBinary(1))
        );
        assert!(ClassProbabilities::new(vec![0.0, f64::NAN]).positive().is_err());
        assert!(ClassProbabilities::new(vec![0.0, 1.5]).positive().is_err());
        assert_eq!(ClassProbabilities::new(vec![0.0, 1.0 + 1e-12]).positive(), Ok(1.0));
    }

    #[test]
    fn test_sigmoid() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-12);
    }
}
