//! The inference capability shared by every fitted model.
//!
//! Training code and consumers only depend on [`Classifier`]; which concrete
//! model sits behind it is decided by configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{CoreError, Result};
use crate::features::argmax;
use crate::forest::RandomForestModel;
use crate::logistic::LogisticModel;

/// Anything that maps a feature vector to class probabilities
pub trait Classifier {
    /// Number of output classes
    fn n_classes(&self) -> usize;

    /// Expected feature vector length
    fn n_features(&self) -> usize;

    /// Class probabilities, one per codec index, summing to 1
    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>>;

    /// Most probable class index
    fn predict(&self, features: &[f32]) -> Result<usize> {
        Ok(argmax(&self.predict_proba(features)?))
    }

    /// Per-feature importance scores, for models that track split usage
    fn feature_importances(&self) -> Option<&[f64]> {
        None
    }
}

/// Fail with [`CoreError::FeatureDimension`] unless `features` has `expected` entries
pub fn check_dimension(features: &[f32], expected: usize) -> Result<()> {
    if features.len() != expected {
        return Err(CoreError::FeatureDimension {
            expected,
            got: features.len(),
        });
    }
    Ok(())
}

/// Which classical model the trainer fits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    Logistic,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::Logistic => "logistic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "random_forest" => Ok(ModelKind::RandomForest),
            "logistic" => Ok(ModelKind::Logistic),
            other => Err(CoreError::UnsupportedModelType(other.to_string())),
        }
    }
}

/// A fitted classical (non-neural) model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassicalModel {
    RandomForest(RandomForestModel),
    Logistic(LogisticModel),
}

impl ClassicalModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            ClassicalModel::RandomForest(_) => ModelKind::RandomForest,
            ClassicalModel::Logistic(_) => ModelKind::Logistic,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ClassicalModel::RandomForest(model) => model.validate(),
            ClassicalModel::Logistic(model) => model.validate(),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassicalModel::RandomForest(model) => model,
            ClassicalModel::Logistic(model) => model,
        }
    }
}

impl Classifier for ClassicalModel {
    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        self.inner().predict_proba(features)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            ClassicalModel::RandomForest(model) => Some(&model.feature_importances),
            ClassicalModel::Logistic(_) => None,
        }
    }
}
