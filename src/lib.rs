//! Diet Similarity Service Library
//!
//! Collects categorical dietary-frequency answers, assembles them into the
//! feature row each pre-trained classifier expects, and reports every model's
//! positive-class probability as a 0-100 similarity score.

pub mod assembler;
pub mod collector;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod schema;
pub mod types;
pub mod web;

pub use assembler::{assemble, FeatureVector};
pub use collector::Selections;
pub use config::AppConfig;
pub use error::PredictError;
pub use models::{Model, ModelRegistry, Scorer};
pub use predictor::Predictor;
pub use schema::{DomainTable, FeatureSchema};
pub use types::{PredictionReport, ScoreResult};
