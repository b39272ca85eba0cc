//! Random forest model with averaged leaf distributions

use serde::{Deserialize, Serialize};

use crate::classifier::{check_dimension, Classifier};
use crate::errors::{CoreError, Result};
use crate::tree::Tree;

/// Ensemble of classification trees
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForestModel {
    pub n_classes: usize,
    pub n_features: usize,
    pub trees: Vec<Tree>,
    /// Mean decrease in impurity per feature, in feature column order
    pub feature_importances: Vec<f64>,
}

impl RandomForestModel {
    pub fn validate(&self) -> Result<()> {
        if self.n_classes < 2 {
            return Err(CoreError::InvalidModel(format!(
                "forest needs at least 2 classes, has {}",
                self.n_classes
            )));
        }
        if self.trees.is_empty() {
            return Err(CoreError::InvalidModel("forest has no trees".to_string()));
        }
        if self.feature_importances.len() != self.n_features {
            return Err(CoreError::InvalidModel(format!(
                "{} feature importances for {} features",
                self.feature_importances.len(),
                self.n_features
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|e| CoreError::InvalidModel(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestModel {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f32]) -> Result<Vec<f32>> {
        check_dimension(features, self.n_features)?;
        let mut sum = vec![0.0f32; self.n_classes];
        for (i, tree) in self.trees.iter().enumerate() {
            let distribution = tree.evaluate(features).ok_or_else(|| {
                CoreError::InvalidModel(format!("tree {} did not reach a leaf", i))
            })?;
            for (acc, &p) in sum.iter_mut().zip(distribution) {
                *acc += p;
            }
        }
        let n = self.trees.len().max(1) as f32;
        for p in &mut sum {
            *p /= n;
        }
        Ok(sum)
    }

    fn feature_importances(&self) -> Option<&[f64]> {
        Some(&self.feature_importances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;

    fn two_tree_forest() -> RandomForestModel {
        let a = Tree::new(vec![
            Node::internal(0, 0.5, 1, 2),
            Node::leaf(vec![1.0, 0.0]),
            Node::leaf(vec![0.0, 1.0]),
        ]);
        let b = Tree::new(vec![
            Node::internal(1, 0.5, 1, 2),
            Node::leaf(vec![0.5, 0.5]),
            Node::leaf(vec![0.0, 1.0]),
        ]);
        RandomForestModel {
            n_classes: 2,
            n_features: 2,
            trees: vec![a, b],
            feature_importances: vec![0.6, 0.4],
        }
    }

    #[test]
    fn test_predict_proba_averages_trees() {
        let forest = two_tree_forest();
        let proba = forest.predict_proba(&[1.0, 0.0]).unwrap();
        assert!((proba[0] - 0.25).abs() < 1e-6);
        assert!((proba[1] - 0.75).abs() < 1e-6);
        assert_eq!(forest.predict(&[1.0, 0.0]).unwrap(), 1);
        assert_eq!(forest.predict(&[0.0, 0.0]).unwrap(), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let forest = two_tree_forest();
        assert!(matches!(
            forest.predict_proba(&[1.0]),
            Err(CoreError::FeatureDimension { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_validate() {
        let mut forest = two_tree_forest();
        assert!(forest.validate().is_ok());
        forest.feature_importances.pop();
        assert!(forest.validate().is_err());
    }
}
