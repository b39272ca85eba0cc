//! Classical model selection
//!
//! The configured [`ModelKind`] picks one estimator; callers only see the
//! fitted [`ClassicalModel`].

use signaura_nmf_core::{ClassicalModel, ModelKind};

use crate::config::PipelineConfig;
use crate::dataset::EncodedDataset;
use crate::errors::Result;
use crate::forest::ForestTrainer;
use crate::logistic::LogisticTrainer;

pub enum Estimator {
    RandomForest(ForestTrainer),
    Logistic(LogisticTrainer),
}

impl Estimator {
    pub fn new(kind: ModelKind, config: &PipelineConfig) -> Self {
        match kind {
            ModelKind::RandomForest => {
                Estimator::RandomForest(ForestTrainer::new(config.forest.clone(), config.seed))
            }
            ModelKind::Logistic => Estimator::Logistic(LogisticTrainer::new(config.logistic.clone())),
        }
    }

    /// Resolve the estimator named by `config.model_type`
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Ok(Self::new(config.model_kind()?, config))
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Estimator::RandomForest(_) => ModelKind::RandomForest,
            Estimator::Logistic(_) => ModelKind::Logistic,
        }
    }

    pub fn fit(&self, data: &EncodedDataset, n_classes: usize) -> Result<ClassicalModel> {
        Ok(match self {
            Estimator::RandomForest(trainer) => {
                ClassicalModel::RandomForest(trainer.fit(data, n_classes)?)
            }
            Estimator::Logistic(trainer) => ClassicalModel::Logistic(trainer.fit(data, n_classes)?),
        })
    }
}
