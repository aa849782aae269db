//! Configuration management for the similarity service

use crate::schema::{DomainTable, FeatureDomain};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that overrides the configuration file location
pub const CONFIG_PATH_ENV: &str = "DIET_SIMILARITY_CONFIG";

/// Prefix for `DIET_SIMILARITY__SECTION__KEY` overrides
pub const ENV_PREFIX: &str = "DIET_SIMILARITY";

/// Deployment variant: answer ranges and which models are scored.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Logistic model, unmatched questions range 0..=37
    #[default]
    Classic,
    /// Logistic model, unmatched questions range 0..=20
    Compact,
    /// Logistic regression, random forest and gradient boosting
    Ensemble,
}

impl Variant {
    pub fn default_upper_bound(self) -> i64 {
        match self {
            Variant::Classic | Variant::Ensemble => 37,
            Variant::Compact => 20,
        }
    }

    /// Models scored by this variant, resolved against `models_dir`.
    pub fn model_entries(self, models_dir: &Path) -> Vec<ModelEntry> {
        let logistic = ModelEntry::new("Logistic Regression", models_dir.join("logistic_model.json"));
        match self {
            Variant::Classic | Variant::Compact => vec![logistic],
            Variant::Ensemble => vec![
                logistic,
                ModelEntry::new("Random Forest", models_dir.join("random_forest.json")),
                ModelEntry::new("Gradient Boosting", models_dir.join("gradient_boosting.json")),
            ],
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8501".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// One model artifact to load at startup
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ModelEntry {
    /// Label shown next to the score
    pub label: String,
    /// Artifact path (`.json` or `.onnx`)
    pub path: PathBuf,
}

impl ModelEntry {
    pub fn new(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
        }
    }
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory the variant's default artifacts are read from
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,
    /// Explicit artifact list; replaces the variant's models when non-empty
    #[serde(default)]
    pub artifacts: Vec<ModelEntry>,
    /// Per-model estimation budget in milliseconds (0 disables)
    #[serde(default)]
    pub timeout_ms: u64,
    /// Number of threads for ONNX inference per model
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_onnx_threads() -> usize {
    1
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            artifacts: Vec::new(),
            timeout_ms: 0,
            onnx_threads: default_onnx_threads(),
        }
    }
}

/// Answer domain for one question: an upper bound or explicit values.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum DomainSpec {
    UpperBound(i64),
    Values(Vec<i64>),
}

impl DomainSpec {
    pub fn to_domain(&self) -> Option<FeatureDomain> {
        match self {
            DomainSpec::UpperBound(upper) => Some(FeatureDomain::range(*upper)),
            DomainSpec::Values(values) => FeatureDomain::from_values(values.clone()),
        }
    }
}

/// Feature schema configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SchemaConfig {
    /// Range upper bound for questions missing from the table
    pub default_upper_bound: Option<i64>,
    /// Extra or replacement table entries, checked before the survey table
    #[serde(default)]
    pub domains: BTreeMap<String, DomainSpec>,
}

/// Static page content
#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_intro")]
    pub intro: String,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

fn default_title() -> String {
    "DMCH-IITD Machine Learning Tool for Estimating the Diet Percentage Similarity with Respect \
     to Diets Consumed by Inflammatory Bowel Disease Patients Prior to Diagnosis"
        .to_string()
}

fn default_intro() -> String {
    "This tool uses machine learning models to estimate the similarity of your diet with those \
     consumed by patients prior to an Inflammatory Bowel Disease (IBD) diagnosis. The models were \
     trained on a dietary survey conducted by DMCH Ludhiana among IBD patients and controls \
     without IBD. Patients reported their dietary habits prior to diagnosis; controls reported \
     current food habits."
        .to_string()
}

fn default_prompt() -> String {
    "Select the level of consumption for each food item (higher values indicate higher \
     consumption, and vice versa)."
        .to_string()
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            intro: default_intro(),
            prompt: default_prompt(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `$DIET_SIMILARITY_CONFIG` or the default path
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Artifacts to load: the explicit list, else the variant's models
    pub fn model_entries(&self) -> Vec<ModelEntry> {
        if self.models.artifacts.is_empty() {
            self.variant.model_entries(&self.models.dir)
        } else {
            self.models.artifacts.clone()
        }
    }

    pub fn default_upper_bound(&self) -> i64 {
        self.schema
            .default_upper_bound
            .unwrap_or_else(|| self.variant.default_upper_bound())
    }

    /// Domain table: configured entries first, then the survey table
    pub fn domain_table(&self) -> DomainTable {
        let overrides = self
            .schema
            .domains
            .iter()
            .filter_map(|(name, spec)| match spec.to_domain() {
                Some(domain) => Some((name.clone(), domain)),
                None => {
                    warn!(feature = %name, "Ignoring empty domain in configuration");
                    None
                }
            })
            .collect();
        DomainTable::survey_with(overrides, self.default_upper_bound())
    }

    pub fn estimation_timeout(&self) -> Option<Duration> {
        (self.models.timeout_ms > 0).then(|| Duration::from_millis(self.models.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.variant, Variant::Classic);
        assert_eq!(config.server.bind, "127.0.0.1:8501");
        assert_eq!(config.default_upper_bound(), 37);
        assert_eq!(config.estimation_timeout(), None);

        let entries = config.model_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, PathBuf::from("models/logistic_model.json"));
    }

    #[test]
    fn test_variants() {
        assert_eq!(Variant::Compact.default_upper_bound(), 20);
        let labels: Vec<String> = Variant::Ensemble
            .model_entries(Path::new("m"))
            .into_iter()
            .map(|e| e.label)
            .collect();
        assert_eq!(labels, vec!["Logistic Regression", "Random Forest", "Gradient Boosting"]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
variant = "compact"

[models]
timeout_ms = 1500
artifacts = [{ label = "Custom", path = "custom.json" }]

[schema.domains]
"Fruits" = 3
"Sleep Hours" = [4, 6, 8]
"Empty" = []

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.variant, Variant::Compact);
        assert_eq!(config.estimation_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.model_entries(), vec![ModelEntry::new("Custom", "custom.json")]);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");

        let table = config.domain_table();
        assert_eq!(table.lookup("fruits").values(), &[0, 1, 2, 3]);
        assert_eq!(table.lookup("sleep_hours").values(), &[4, 6, 8]);
        assert_eq!(table.lookup("Empty").len(), 21);
        assert_eq!(table.lookup("Milk").len(), 6);
    }
}
