//! Random forest trainer
//!
//! Each tree is grown on its own bootstrap sample with its own RNG stream,
//! so trees build in parallel and the result does not depend on the
//! thread pool size.

use rand::Rng;
use rayon::prelude::*;
use signaura_nmf_core::RandomForestModel;
use tracing::{debug, info};

use crate::cart::{CartBuilder, GrownTree, TreeConfig};
use crate::config::ForestSettings;
use crate::dataset::EncodedDataset;
use crate::deterministic::{stream_rng, Stream};
use crate::errors::{Result, TrainerError};

/// Bagged ensemble of CART trees
pub struct ForestTrainer {
    settings: ForestSettings,
    seed: u64,
}

impl ForestTrainer {
    pub fn new(settings: ForestSettings, seed: u64) -> Self {
        Self { settings, seed }
    }

    /// Features examined per split for `n_features` columns
    pub fn max_features(&self, n_features: usize) -> usize {
        let default = ((n_features as f64).sqrt().floor() as usize).max(1);
        self.settings
            .max_features
            .unwrap_or(default)
            .clamp(1, n_features.max(1))
    }

    pub fn fit(&self, data: &EncodedDataset, n_classes: usize) -> Result<RandomForestModel> {
        if data.is_empty() {
            return Err(TrainerError::InsufficientData(
                "cannot fit a forest on an empty partition".to_string(),
            ));
        }
        let n_features = data.x[0].len();
        let tree_config = TreeConfig {
            max_depth: self.settings.max_depth,
            min_samples_split: self.settings.min_samples_split,
            min_samples_leaf: self.settings.min_samples_leaf,
            max_features: self.max_features(n_features),
        };

        info!(
            "Growing {} trees (max_depth={}, max_features={})",
            self.settings.n_estimators, tree_config.max_depth, tree_config.max_features
        );

        let grown: Vec<GrownTree> = (0..self.settings.n_estimators)
            .into_par_iter()
            .map(|tree_idx| self.grow_tree(tree_idx, data, n_classes, tree_config.clone()))
            .collect();

        let feature_importances = aggregate_importances(&grown, n_features);
        let trees: Vec<_> = grown.into_iter().map(|g| g.tree).collect();
        debug!(
            "Forest depth range {}..={}",
            trees.iter().map(|t| t.depth()).min().unwrap_or(0),
            trees.iter().map(|t| t.depth()).max().unwrap_or(0)
        );

        let model = RandomForestModel {
            n_classes,
            n_features,
            trees,
            feature_importances,
        };
        model.validate()?;
        Ok(model)
    }

    fn grow_tree(
        &self,
        tree_idx: usize,
        data: &EncodedDataset,
        n_classes: usize,
        config: TreeConfig,
    ) -> GrownTree {
        let mut rng = stream_rng(self.seed, Stream::Tree(tree_idx as u64));
        let n = data.len();

        // Bootstrap multiplicities.
        let mut weights = vec![0.0f64; n];
        for _ in 0..n {
            weights[rng.gen_range(0..n)] += 1.0;
        }

        CartBuilder::new(&data.x, &data.y, &weights, n_classes, config).build(&mut rng)
    }
}

/// Per-tree normalized MDI, averaged over the forest and renormalized
///
/// Falls back to a uniform vector when no tree ever split.
pub fn aggregate_importances(grown: &[GrownTree], n_features: usize) -> Vec<f64> {
    let mut total = vec![0.0f64; n_features];
    for tree in grown {
        let sum: f64 = tree.importances.iter().sum();
        if sum > 0.0 {
            for (acc, v) in total.iter_mut().zip(&tree.importances) {
                *acc += v / sum;
            }
        }
    }

    let sum: f64 = total.iter().sum();
    if sum > 0.0 {
        total.iter_mut().for_each(|v| *v /= sum);
        total
    } else {
        vec![1.0 / n_features.max(1) as f64; n_features]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signaura_nmf_core::{Classifier, Tree};

    fn toy_data() -> EncodedDataset {
        // Class is decided by feature 0 alone; feature 1 is noise, feature 2 constant.
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..30 {
            let class = i % 3;
            x.push(vec![class as f32, ((i * 7) % 5) as f32, 1.0]);
            y.push(class);
        }
        EncodedDataset { x, y }
    }

    fn settings(n_estimators: usize) -> ForestSettings {
        ForestSettings {
            n_estimators,
            max_features: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn test_forest_learns_toy_problem() {
        let data = toy_data();
        let model = ForestTrainer::new(settings(15), 42).fit(&data, 3).unwrap();

        assert_eq!(model.num_trees(), 15);
        for class in 0..3 {
            let probs = model.predict_proba(&[class as f32, 0.0, 1.0]).unwrap();
            assert_eq!(signaura_nmf_core::features::argmax(&probs), class);
        }
        let sum: f64 = model.feature_importances.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(model.feature_importances[0] > model.feature_importances[1]);
        assert_eq!(model.feature_importances[2], 0.0);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let data = toy_data();
        let a = ForestTrainer::new(settings(8), 7).fit(&data, 3).unwrap();
        let b = ForestTrainer::new(settings(8), 7).fit(&data, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_max_features() {
        let trainer = ForestTrainer::new(ForestSettings::default(), 0);
        assert_eq!(trainer.max_features(6), 2);
        assert_eq!(trainer.max_features(1), 1);
        assert_eq!(trainer.max_features(16), 4);
    }

    #[test]
    fn test_importances_uniform_without_splits() {
        let grown = vec![GrownTree {
            tree: Tree::default(),
            importances: vec![0.0; 4],
        }];
        assert_eq!(aggregate_importances(&grown, 4), vec![0.25; 4]);
    }

    #[test]
    fn test_empty_partition() {
        let data = EncodedDataset {
            x: Vec::new(),
            y: Vec::new(),
        };
        assert!(matches!(
            ForestTrainer::new(settings(2), 0).fit(&data, 2),
            Err(TrainerError::InsufficientData(_))
        ));
    }
}
