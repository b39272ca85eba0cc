//! Decision tree structures for ensemble inference
//!
//! Nodes are stored in a flat vector with node 0 as the root. Leaves carry
//! the class probability distribution observed during fitting.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` holds one probability per class
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Samples with `feature <= threshold` go left
    pub threshold: f32,

    /// Class distribution (Some for leaf nodes)
    pub leaf: Option<Vec<f32>>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(feature_idx: i32, threshold: f32, left: i32, right: i32) -> Self {
        Self {
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(distribution: Vec<f32>) -> Self {
        Self {
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(distribution),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single classification tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Walk the tree and return the distribution of the reached leaf
    ///
    /// Returns `None` when the structure is broken (dangling child index or
    /// feature index beyond the vector).
    pub fn evaluate(&self, features: &[f32]) -> Option<&[f32]> {
        let mut idx = 0usize;

        // A well-formed tree reaches a leaf in at most `nodes.len()` steps.
        for _ in 0..=self.nodes.len() {
            let node = self.nodes.get(idx)?;

            if let Some(distribution) = &node.leaf {
                return Some(distribution);
            }

            let feature_value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
            let next = if feature_value <= node.threshold {
                node.left
            } else {
                node.right
            };
            idx = usize::try_from(next).ok()?;
        }

        None
    }

    /// Depth of the deepest leaf (a lone root leaf has depth 0)
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, depth: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    let left = walk(nodes, node.left.max(0) as usize, depth + 1);
                    let right = walk(nodes, node.right.max(0) as usize, depth + 1);
                    left.max(right)
                }
                _ => depth,
            }
        }
        if self.nodes.is_empty() {
            return 0;
        }
        walk(&self.nodes, 0, 0)
    }

    /// Validate child links, leaf arity and feature indices
    pub fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match &node.leaf {
                Some(distribution) => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {} has {} classes, expected {}",
                            i,
                            distribution.len(),
                            n_classes
                        ));
                    }
                }
                None => {
                    if node.feature_idx < 0 || node.feature_idx as usize >= n_features {
                        return Err(format!(
                            "node {} splits on invalid feature {}",
                            i, node.feature_idx
                        ));
                    }
                    for child in [node.left, node.right] {
                        // Children are always emitted after their parent.
                        if child <= i as i32 || child as usize >= self.nodes.len() {
                            return Err(format!("node {} has invalid child {}", i, child));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(3, 0.5, 1, 2),
            Node::leaf(vec![1.0, 0.0]),
            Node::leaf(vec![0.25, 0.75]),
        ])
    }

    #[test]
    fn test_evaluate_follows_threshold() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0]), Some(&[1.0, 0.0][..]));
        assert_eq!(tree.evaluate(&[0.0, 0.0, 0.0, 0.5, 0.0, 0.0]), Some(&[1.0, 0.0][..]));
        assert_eq!(tree.evaluate(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]), Some(&[0.25, 0.75][..]));
    }

    #[test]
    fn test_evaluate_rejects_short_vectors() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let tree = Tree::new(vec![Node::internal(0, 0.5, 0, 0)]);
        assert_eq!(tree.evaluate(&[0.0]), None);
        assert!(tree.validate(1, 2).is_err());
    }

    #[test]
    fn test_validate_and_depth() {
        let tree = stump();
        assert!(tree.validate(6, 2).is_ok());
        assert!(tree.validate(6, 3).is_err());
        assert!(tree.validate(2, 2).is_err());
        assert_eq!(tree.depth(), 1);
    }
}
