//! Model artifact loader

use crate::error::PredictError;
use crate::models::{LogisticModel, Model, TreeEnsemble};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// A classifier together with the label it is reported under.
#[derive(Clone)]
pub struct LoadedModel {
    /// Display label, e.g. "Logistic Regression"
    pub label: String,
    /// Artifact the model came from
    pub path: PathBuf,
    pub model: Arc<dyn Model>,
}

impl LoadedModel {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>, model: Arc<dyn Model>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            model,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        self.model.feature_names()
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("kind", &self.model.kind())
            .field("features", &self.model.feature_names().len())
            .finish()
    }
}

/// JSON artifact, tagged by `kind`.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonArtifact {
    Logistic(LogisticModel),
    TreeEnsemble(TreeEnsemble),
}

/// Deserializes model artifacts from disk.
pub struct ModelLoader {
    /// Intra-op threads for ONNX sessions
    #[cfg_attr(not(feature = "onnx"), allow(dead_code))]
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load one artifact. `.json` files hold logistic or tree-ensemble
    /// models; `.onnx` files need the `onnx` feature.
    pub fn load_model<P: AsRef<Path>>(&self, path: P, label: &str) -> Result<LoadedModel, PredictError> {
        let path = path.as_ref();
        info!(model = %label, path = %path.display(), "Loading model artifact");

        if !path.exists() {
            return Err(PredictError::ArtifactMissing {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let model: Arc<dyn Model> = match extension.as_deref() {
            Some("json") => self.load_json(path),
            Some("onnx") => self.load_onnx(path),
            _ => Err(PredictError::ArtifactMissing {
                path: path.to_path_buf(),
                reason: "unsupported artifact format".to_string(),
            }),
        }
        .map_err(|e| match e {
            // An inconsistent artifact is as unusable as a missing one.
            PredictError::InvalidArtifact { .. } => PredictError::ArtifactMissing {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
            other => other,
        })?;

        info!(
            model = %label,
            kind = model.kind(),
            features = model.feature_names().len(),
            "Model loaded successfully"
        );

        Ok(LoadedModel::new(label, path, model))
    }

    fn load_json(&self, path: &Path) -> Result<Arc<dyn Model>, PredictError> {
        let unreadable = |reason: String| PredictError::ArtifactMissing {
            path: path.to_path_buf(),
            reason,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        let artifact: JsonArtifact =
            serde_json::from_str(&raw).map_err(|e| unreadable(e.to_string()))?;

        match artifact {
            JsonArtifact::Logistic(model) => {
                model.validate()?;
                Ok(Arc::new(model))
            }
            JsonArtifact::TreeEnsemble(model) => {
                model.validate()?;
                Ok(Arc::new(model))
            }
        }
    }

    #[cfg(feature = "onnx")]
    fn load_onnx(&self, path: &Path) -> Result<Arc<dyn Model>, PredictError> {
        let model = crate::models::onnx::OnnxModel::load(path, self.onnx_threads)?;
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    fn load_onnx(&self, path: &Path) -> Result<Arc<dyn Model>, PredictError> {
        Err(PredictError::ArtifactMissing {
            path: path.to_path_buf(),
            reason: "ONNX support not compiled in (enable the `onnx` feature)".to_string(),
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::FeatureVector;

    #[test]
    fn test_load_logistic_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logistic_model.json");
        std::fs::write(
            &path,
            r#"{"kind":"logistic","feature_names":["Fruits","Milk"],"coefficients":[0.1,0.2],"intercept":0.0}"#,
        )
        .unwrap();

        let loaded = ModelLoader::new().load_model(&path, "Logistic Regression").unwrap();
        assert_eq!(loaded.label, "Logistic Regression");
        assert_eq!(loaded.model.kind(), "logistic");
        assert_eq!(loaded.feature_names(), &["Fruits".to_string(), "Milk".to_string()]);

        let probs = loaded
            .model
            .predict_proba(&FeatureVector::new(vec![0.0, 0.0]))
            .unwrap();
        assert_eq!(probs.positive().unwrap(), 0.5);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelLoader::new()
            .load_model(dir.path().join("absent.json"), "m")
            .unwrap_err();
        assert_eq!(err.kind(), "artifact_missing");
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = ModelLoader::new().load_model(&path, "m").unwrap_err();
        assert_eq!(err.kind(), "artifact_missing");
    }

    #[test]
    fn test_inconsistent_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.json");
        std::fs::write(
            &path,
            r#"{"kind":"logistic","feature_names":["Fruits","Milk"],"coefficients":[0.1],"intercept":0.0}"#,
        )
        .unwrap();

        let err = ModelLoader::new().load_model(&path, "m").unwrap_err();
        assert_eq!(err.kind(), "artifact_missing");
        assert!(err.to_string().contains("1 coefficients for 2 features"));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.pkl");
        std::fs::write(&path, b"\x80\x04").unwrap();

        let err = ModelLoader::new().load_model(&path, "m").unwrap_err();
        assert!(err.to_string().contains("unsupported"));
    }
}
