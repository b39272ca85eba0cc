//! Multinomial logistic regression over standardized features.

use serde::{Deserialize, Serialize};

use crate::classifier::{check_dimension, Classifier};
use crate::errors::{CoreError, Result};
use crate::features::softmax;

/// Linear softmax classifier
///
/// `weights` is row-major `[class][feature]`. Inputs are standardized with
/// the stored training mean/scale before the linear map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    pub n_classes: usize,
    pub n_features: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
    pub feature_mean: Vec<f32>,
    pub feature_scale: Vec<f32>,
}

impl LogisticModel {
    pub fn validate(&self) -> Result<()> {
        if self.n_classes < 2 {
            return Err(CoreError::InvalidModel(format!(
                "logistic model needs at least 2 classes, has {}",
                self.n_classes
            )));
        }
        if self.weights.len() != self.n_classes * self.n_features {
            return Err(CoreError::InvalidModel("weights length mismatch".to_string()));
        }
        if self.bias.len() != self.n_classes {
            return Err(CoreError::InvalidModel("bias length mismatch".to_string()));
        }
        if self.feature_mean.len() != self.n_features || self.feature_scale.len() != self.n_features
        {
            return Err(CoreError::InvalidModel(
                "standardization length mismatch".to_string(),
            ));
        }
        if self.feature_scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(CoreError::InvalidModel(
                "feature scale must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the stored standardization
    pub fn standardize(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .zip(self.feature_mean.iter().zip(&self.feature_scale))
            .map(|(&x, (&mean, &scale))| (x - mean) / scale)
            .collect()
    }

    /// Raw class scores for an already standardized vector
    pub fn logits(&self, standardized: &[f32]) -> Vec<f32> {
        (0..self.n_classes)
            .map(|c| {
                let row = &self.weights[c * self.n_features..(c + 1) * self.n_features];
                self.bias[c] + row.iter().zip(standardized).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect()
    }
}

impl Classifier for LogisticModel {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        check_dimension(features, self.n_features)?;
        Ok(softmax(&self.logits(&self.standardize(features))))
    }
}
