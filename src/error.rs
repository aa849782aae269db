//! Error taxonomy for loading, assembling and scoring

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictError {
    /// A model artifact could not be found or deserialized at startup.
    #[error("model artifact {path} unavailable: {reason}")]
    ArtifactMissing { path: PathBuf, reason: String },

    /// An artifact parsed but its contents are inconsistent.
    #[error("invalid model artifact: {message}")]
    InvalidArtifact { message: String },

    /// The collected answers cannot be aligned with a model's feature order.
    #[error("schema mismatch for {model}: missing features {missing:?}")]
    SchemaMismatch { model: String, missing: Vec<String> },

    /// The probability estimation call itself failed.
    #[error("estimation failed for {model}: {message}")]
    EstimationFailure { model: String, message: String },

    #[error("estimation for {model} exceeded {}ms", .after.as_millis())]
    Timeout { model: String, after: Duration },

    /// A submitted answer is not part of the feature's domain.
    #[error("invalid selection for {feature}: {value}")]
    InvalidSelection { feature: String, value: String },
}

impl PredictError {
    pub fn invalid_artifact(message: impl Into<String>) -> Self {
        PredictError::InvalidArtifact {
            message: message.into(),
        }
    }

    pub fn estimation(model: &str, message: impl Into<String>) -> Self {
        PredictError::EstimationFailure {
            model: model.to_string(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used in logs and JSON reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ArtifactMissing { .. } => "artifact_missing",
            PredictError::InvalidArtifact { .. } => "invalid_artifact",
            PredictError::SchemaMismatch { .. } => "schema_mismatch",
            PredictError::EstimationFailure { .. } => "estimation_failure",
            PredictError::Timeout { .. } => "timeout",
            PredictError::InvalidSelection { .. } => "invalid_selection",
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
