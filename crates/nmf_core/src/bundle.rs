//! Trained model bundle: fitted classifier + label codec + feature order.
//!
//! The bundle is the classical-model artifact. It is written once after
//! fitting with `bincode` and can be loaded by any consumer that links this
//! crate, without retraining.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::classifier::{ClassicalModel, Classifier, ModelKind};
use crate::errors::{CoreError, Result};
use crate::label_codec::LabelCodec;
use crate::serialization::hash_canonical_hex;

/// Descriptive data recorded at fit time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub model_kind: ModelKind,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub training_samples: usize,
    /// BLAKE3 of the canonical JSON of model, codec and feature names
    pub model_hash: String,
}

/// Hashed portion of the bundle; excludes the timestamp
#[derive(Serialize)]
struct HashedContent<'a> {
    model: &'a ClassicalModel,
    codec: &'a LabelCodec,
    feature_names: &'a [String],
}

/// A single labelled prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub probabilities: Vec<f32>,
}

/// Immutable snapshot of a fitted classical model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    model: ClassicalModel,
    codec: LabelCodec,
    feature_names: Vec<String>,
    metadata: BundleMetadata,
}

impl ModelBundle {
    pub fn new(
        model: ClassicalModel,
        codec: LabelCodec,
        feature_names: Vec<String>,
        training_samples: usize,
        created_at: i64,
    ) -> Result<Self> {
        let model_hash = hash_canonical_hex(&HashedContent {
            model: &model,
            codec: &codec,
            feature_names: &feature_names,
        })?;
        let bundle = Self {
            metadata: BundleMetadata {
                model_kind: model.kind(),
                created_at,
                training_samples,
                model_hash,
            },
            model,
            codec,
            feature_names,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn model(&self) -> &ClassicalModel {
        &self.model
    }

    pub fn codec(&self) -> &LabelCodec {
        &self.codec
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    /// Check that model, codec and feature order describe the same problem
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.codec.validate()?;
        if self.model.n_classes() != self.codec.len() {
            return Err(CoreError::InvalidModel(format!(
                "model predicts {} classes but codec has {} labels",
                self.model.n_classes(),
                self.codec.len()
            )));
        }
        if self.model.n_features() != self.feature_names.len() {
            return Err(CoreError::InvalidModel(format!(
                "model expects {} features but {} names are recorded",
                self.model.n_features(),
                self.feature_names.len()
            )));
        }
        if self.metadata.model_kind != self.model.kind() {
            return Err(CoreError::InvalidModel(
                "metadata model kind does not match model".to_string(),
            ));
        }
        Ok(())
    }

    /// Predict and decode a feature vector given in `feature_names` order
    pub fn predict_label(&self, features: &[f32]) -> Result<Prediction> {
        let probabilities = self.model.predict_proba(features)?;
        let index = crate::features::argmax(&probabilities);
        let label = self.codec.decode(index)?.to_string();
        Ok(Prediction {
            index,
            label,
            probabilities,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bundle: Self = bincode::deserialize(bytes)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path.as_ref(), self.to_bytes()?)?;
        debug!("Model bundle written to {}", path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl Classifier for ModelBundle {
    fn n_classes(&self) -> usize {
        self.model.n_classes()
    }

    fn n_features(&self) -> usize {
        self.model.n_features()
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        self.model.predict_proba(features)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        self.model.feature_importances()
    }
}
