//! ONNX classifiers exported from the training pipeline.
//!
//! ONNX files carry no feature names, so each `<stem>.onnx` is paired with a
//! `<stem>.features.json` sidecar: `{"feature_names": [...]}`.

use crate::assembler::FeatureVector;
use crate::error::PredictError;
use crate::models::{check_width, ClassProbabilities, EstimationError, Model};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};
use tracing::{debug, info};

static ORT_INIT: Once = Once::new();

#[derive(Debug, Deserialize)]
struct FeatureInfo {
    feature_names: Vec<String>,
}

/// ONNX Runtime session plus its input contract.
///
/// `Session::run` needs exclusive access, so calls are serialized per model.
/// An estimate abandoned by [`Scorer`](crate::models::Scorer) on timeout still
/// holds the lock until ONNX Runtime returns.
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    feature_names: Vec<String>,
}

/// Location of the feature-name sidecar for an ONNX file.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.features.json", stem))
}

impl OnnxModel {
    pub fn load(path: &Path, intra_threads: usize) -> Result<Self, PredictError> {
        let unreadable = |reason: String| PredictError::ArtifactMissing {
            path: path.to_path_buf(),
            reason,
        };

        ORT_INIT.call_once(|| {
            if let Err(e) = ort::init().commit() {
                tracing::warn!(error = %e, "ONNX Runtime environment init failed");
            }
        });

        let info_path = sidecar_path(path);
        let info: FeatureInfo = std::fs::read_to_string(&info_path)
            .map_err(|e| unreadable(format!("{}: {}", info_path.display(), e)))
            .and_then(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| unreadable(format!("{}: {}", info_path.display(), e)))
            })?;
        if info.feature_names.is_empty() {
            return Err(PredictError::invalid_artifact(format!(
                "{} lists no features",
                info_path.display()
            )));
        }

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(intra_threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| unreadable(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            path = %path.display(),
            input = %input_name,
            output = %output_name,
            features = info.feature_names.len(),
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            feature_names: info.feature_names,
        })
    }

    fn extract(&self, outputs: &SessionOutputs) -> Result<ClassProbabilities, EstimationError> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(probs) = probabilities_from(&output)? {
                return Ok(probs);
            }
        }

        // Fall back to the first non-label output that yields probabilities.
        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(probs) = probabilities_from(&output)? {
                debug!(output = %name, "Probabilities taken from fallback output");
                return Ok(probs);
            }
        }

        Err(EstimationError::Runtime(
            "no probability output found".to_string(),
        ))
    }
}

/// Read a `[1, classes]` tensor or a `seq(map(int64, float))` output.
fn probabilities_from(output: &DynValue) -> Result<Option<ClassProbabilities>, EstimationError> {
    if let Ok((_shape, data)) = output.try_extract_tensor::<f32>() {
        return Ok(Some(ClassProbabilities::new(
            data.iter().map(|&v| v as f64).collect(),
        )));
    }

    if DynSequenceValueType::can_downcast(&output.dtype()) {
        let allocator = Allocator::default();
        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| EstimationError::Runtime(e.to_string()))?;
        let maps = sequence
            .try_extract_sequence::<DynMapValueType>(&allocator)
            .map_err(|e| EstimationError::Runtime(e.to_string()))?;
        let first = maps
            .first()
            .ok_or_else(|| EstimationError::Runtime("empty output sequence".to_string()))?;
        let mut pairs = first
            .try_extract_key_values::<i64, f32>()
            .map_err(|e| EstimationError::Runtime(e.to_string()))?;
        pairs.sort_by_key(|(class, _)| *class);
        return Ok(Some(ClassProbabilities::new(
            pairs.into_iter().map(|(_, p)| p as f64).collect(),
        )));
    }

    Ok(None)
}

impl Model for OnnxModel {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, row: &FeatureVector) -> Result<ClassProbabilities, EstimationError> {
        check_width(self.feature_names.len(), row)?;

        let shape = vec![1_i64, row.len() as i64];
        let input = Tensor::from_array((shape, row.to_f32()))
            .map_err(|e| EstimationError::Runtime(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EstimationError::Runtime(format!("session lock poisoned: {}", e)))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| EstimationError::Runtime(e.to_string()))?;

        self.extract(&outputs)
    }
}
