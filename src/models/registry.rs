//! Registry of the classifiers loaded at startup.
//!
//! Built once, then shared read-only by every request. Load failures are
//! recorded rather than returned so the form can still render.

use crate::config::ModelEntry;
use crate::error::PredictError;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::schema::{DomainTable, FeatureSchema};
use tracing::{error, info, warn};

/// One configured model: loaded, or the reason it is not.
#[derive(Debug, Clone)]
pub enum ModelSlot {
    Ready(LoadedModel),
    Unavailable { label: String, error: PredictError },
}

impl ModelSlot {
    pub fn label(&self) -> &str {
        match self {
            ModelSlot::Ready(model) => &model.label,
            ModelSlot::Unavailable { label, .. } => label,
        }
    }
}

#[derive(Debug)]
pub struct ModelRegistry {
    /// Every configured model, in configuration order
    slots: Vec<ModelSlot>,
    models: Vec<LoadedModel>,
    failures: Vec<PredictError>,
    schema: FeatureSchema,
}

impl ModelRegistry {
    /// Load every configured artifact.
    ///
    /// The form schema follows the first model that loads. With no model at
    /// all it falls back to placeholder features. Entries that fail to load
    /// keep their slot so predictions still report them.
    pub fn load(entries: &[ModelEntry], table: &DomainTable, loader: &ModelLoader) -> Self {
        let slots = entries
            .iter()
            .map(|entry| match loader.load_model(&entry.path, &entry.label) {
                Ok(model) => ModelSlot::Ready(model),
                Err(e) => {
                    error!(model = %entry.label, error = %e, "Failed to load model, scoring will fall back");
                    ModelSlot::Unavailable {
                        label: entry.label.clone(),
                        error: e,
                    }
                }
            })
            .collect();

        let registry = Self::from_slots(slots, table);
        info!(
            loaded = registry.models.len(),
            failed = registry.failures.len(),
            features = registry.schema.len(),
            placeholder = registry.schema.is_placeholder(),
            "Model registry ready"
        );
        registry
    }

    /// Assemble a registry from already-loaded models.
    pub fn from_models(models: Vec<LoadedModel>, table: &DomainTable) -> Self {
        Self::from_slots(models.into_iter().map(ModelSlot::Ready).collect(), table)
    }

    fn from_slots(slots: Vec<ModelSlot>, table: &DomainTable) -> Self {
        let mut models = Vec::new();
        let mut failures = Vec::new();
        for slot in &slots {
            match slot {
                ModelSlot::Ready(model) => models.push(model.clone()),
                ModelSlot::Unavailable { error, .. } => failures.push(error.clone()),
            }
        }

        let schema = match models.first() {
            Some(primary) => {
                for other in &models[1..] {
                    if other.feature_names() != primary.feature_names() {
                        warn!(
                            primary = %primary.label,
                            model = %other.label,
                            "Model expects a different feature list than the form collects"
                        );
                    }
                }
                FeatureSchema::from_names(primary.feature_names(), table)
            }
            None => {
                warn!("No models loaded, rendering placeholder features");
                FeatureSchema::placeholder(table)
            }
        };

        Self {
            slots,
            models,
            failures,
            schema,
        }
    }

    /// Configured models in order, including those that failed to load.
    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    pub fn models(&self) -> &[LoadedModel] {
        &self.models
    }

    /// Errors recorded while loading, in configuration order.
    pub fn failures(&self) -> &[PredictError] {
        &self.failures
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// True when some configured model is unavailable.
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty() || self.models.is_empty()
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    pub fn model_labels(&self) -> Vec<String> {
        self.models.iter().map(|m| m.label.clone()).collect()
    }
}
