//! Pipeline configuration
//!
//! Layered as defaults < TOML file < `NMF_*` environment variables < CLI
//! flags. The resolved [`PipelineConfig`] is passed explicitly into
//! [`crate::pipeline::run`]; nothing is read from global state afterwards.

use serde::{Deserialize, Serialize};
use signaura_nmf_core::ModelKind;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{Result, TrainerError};

/// Complete configuration for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// CSV file with feature columns and a `label` column
    pub dataset_path: PathBuf,
    /// Directory receiving the exported artifacts
    pub output_dir: PathBuf,
    /// `random_forest` or `logistic`
    pub model_type: String,
    /// Fraction of each class held out for testing
    pub test_fraction: f64,
    /// Seed for the split, the forest and the network
    pub seed: u64,
    pub forest: ForestSettings,
    pub logistic: LogisticSettings,
    pub neural: NeuralSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("dataset/nmf_training.csv"),
            output_dir: PathBuf::from("."),
            model_type: ModelKind::RandomForest.to_string(),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestSettings::default(),
            logistic: LogisticSettings::default(),
            neural: NeuralSettings::default(),
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestSettings {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` means `floor(sqrt(D))`
    pub max_features: Option<usize>,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticSettings {
    /// Inverse regularization strength
    pub c: f32,
    pub max_iter: usize,
    pub learning_rate: f32,
    /// Stop once the largest gradient component drops below this
    pub tolerance: f32,
}

impl Default for LogisticSettings {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 0.5,
            tolerance: 1e-6,
        }
    }
}

/// Feed-forward network hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuralSettings {
    pub enabled: bool,
    pub hidden_units: Vec<usize>,
    /// Dropout applied after the first hidden layer
    pub dropout: f32,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    /// Tail of the training partition used for monitoring only
    pub validation_fraction: f64,
}

impl Default for NeuralSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            hidden_units: vec![16, 8],
            dropout: 0.3,
            epochs: 50,
            batch_size: 4,
            learning_rate: 0.001,
            validation_fraction: 0.2,
        }
    }
}

impl PipelineConfig {
    /// Load a TOML configuration file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = toml::from_str(&content).map_err(|e| {
            TrainerError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Write the effective configuration as TOML
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrainerError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `NMF_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("NMF_DATASET_PATH") {
            self.dataset_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("NMF_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("NMF_MODEL_TYPE") {
            self.model_type = val;
        }
        if let Some(val) = lookup("NMF_TEST_FRACTION") {
            self.test_fraction = parse_override("NMF_TEST_FRACTION", &val)?;
        }
        if let Some(val) = lookup("NMF_SEED") {
            self.seed = parse_override("NMF_SEED", &val)?;
        }
        if let Some(val) = lookup("NMF_NEURAL_ENABLED") {
            self.neural.enabled = parse_override("NMF_NEURAL_ENABLED", &val)?;
        }
        Ok(())
    }

    /// Resolve `model_type` into a [`ModelKind`]
    pub fn model_kind(&self) -> Result<ModelKind> {
        Ok(self.model_type.parse::<ModelKind>()?)
    }

    /// Reject configurations the pipeline cannot run
    pub fn validate(&self) -> Result<()> {
        self.model_kind()?;
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainerError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.forest.n_estimators == 0 {
            return Err(TrainerError::Config("forest.n_estimators must be > 0".to_string()));
        }
        if self.forest.max_depth == 0 {
            return Err(TrainerError::Config("forest.max_depth must be > 0".to_string()));
        }
        if self.forest.min_samples_split < 2 || self.forest.min_samples_leaf == 0 {
            return Err(TrainerError::Config(
                "forest.min_samples_split must be >= 2 and forest.min_samples_leaf >= 1"
                    .to_string(),
            ));
        }
        if self.forest.max_features == Some(0) {
            return Err(TrainerError::Config("forest.max_features must be > 0".to_string()));
        }
        if !(self.logistic.c > 0.0) || self.logistic.max_iter == 0 {
            return Err(TrainerError::Config(
                "logistic.c must be > 0 and logistic.max_iter > 0".to_string(),
            ));
        }
        if !(self.logistic.learning_rate > 0.0) {
            return Err(TrainerError::Config(
                "logistic.learning_rate must be > 0".to_string(),
            ));
        }
        let neural = &self.neural;
        if neural.hidden_units.is_empty() || neural.hidden_units.contains(&0) {
            return Err(TrainerError::Config(
                "neural.hidden_units must list at least one non-empty layer".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&neural.dropout) {
            return Err(TrainerError::Config(format!(
                "neural.dropout must be in [0, 1), got {}",
                neural.dropout
            )));
        }
        if neural.epochs == 0 || neural.batch_size == 0 {
            return Err(TrainerError::Config(
                "neural.epochs and neural.batch_size must be > 0".to_string(),
            ));
        }
        if !(neural.learning_rate > 0.0) {
            return Err(TrainerError::Config("neural.learning_rate must be > 0".to_string()));
        }
        if !(0.0..1.0).contains(&neural.validation_fraction) {
            return Err(TrainerError::Config(format!(
                "neural.validation_fraction must be in [0, 1), got {}",
                neural.validation_fraction
            )));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TrainerError::Config(format!("{} has invalid value {:?}", key, value)))
}
