//! Type definitions shared by the scorer and the presentation layer

pub mod report;

pub use report::{FallbackNote, PredictionReport, ScoreResult};
