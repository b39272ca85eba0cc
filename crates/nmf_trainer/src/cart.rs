//! CART (Classification and Regression Tree) builder
//!
//! Grows a single classification tree with Gini impurity. Samples carry a
//! weight (the bootstrap multiplicity), so a forest can reuse one feature
//! matrix for every tree. Candidate thresholds are midpoints between
//! consecutive distinct values.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use signaura_nmf_core::{Node, Tree};

use crate::deterministic::SplitTieBreaker;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features examined per node
    pub max_features: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: usize::MAX,
        }
    }
}

/// Split candidate with impurity decrease and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f32,
    improvement: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: f32, improvement: f64) -> Self {
        Self {
            feature_idx,
            threshold,
            improvement,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.improvement > other.improvement
            || (self.improvement == other.improvement && self.tie_breaker < other.tie_breaker)
    }
}

/// Fitted tree plus the unnormalized impurity decrease per feature
#[derive(Debug, Clone)]
pub struct GrownTree {
    pub tree: Tree,
    pub importances: Vec<f64>,
}

/// Build a classification tree using the exact-greedy CART algorithm
pub struct CartBuilder<'a> {
    x: &'a [Vec<f32>],
    y: &'a [usize],
    weights: &'a [f64],
    n_classes: usize,
    feature_count: usize,
    config: TreeConfig,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        x: &'a [Vec<f32>],
        y: &'a [usize],
        weights: &'a [f64],
        n_classes: usize,
        config: TreeConfig,
    ) -> Self {
        debug_assert_eq!(x.len(), y.len());
        debug_assert_eq!(x.len(), weights.len());
        let feature_count = x.first().map_or(0, Vec::len);
        Self {
            x,
            y,
            weights,
            n_classes,
            feature_count,
            config,
        }
    }

    /// Grow the tree on every sample with a positive weight
    pub fn build(&self, rng: &mut StdRng) -> GrownTree {
        let indices: Vec<usize> = (0..self.x.len()).filter(|&i| self.weights[i] > 0.0).collect();
        let mut nodes = Vec::new();
        let mut importances = vec![0.0f64; self.feature_count];

        self.build_node(&indices, 0, &mut nodes, &mut importances, rng);

        GrownTree {
            tree: Tree::new(nodes),
            importances,
        }
    }

    /// Recursively build tree nodes, returning the index of the created node
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        importances: &mut [f64],
        rng: &mut StdRng,
    ) -> i32 {
        let current_idx = nodes.len();
        let counts = self.class_weights(indices);
        let total: f64 = counts.iter().sum();
        let impurity = gini(&counts, total);

        if depth >= self.config.max_depth
            || indices.len() < self.config.min_samples_split
            || impurity <= f64::EPSILON
        {
            nodes.push(Node::leaf(distribution(&counts, total)));
            return current_idx as i32;
        }

        let split = match self.find_best_split(indices, impurity, total, rng) {
            Some(s) => s,
            None => {
                nodes.push(Node::leaf(distribution(&counts, total)));
                return current_idx as i32;
            }
        };

        let (left_indices, right_indices) = self.partition(indices, split.feature_idx, split.threshold);

        // Weighted impurity decrease (mean decrease in impurity)
        importances[split.feature_idx] += split.improvement * total;

        // Reserve space for current node
        nodes.push(Node::internal(split.feature_idx as i32, split.threshold, -1, -1));

        let left_idx = self.build_node(&left_indices, depth + 1, nodes, importances, rng);
        let right_idx = self.build_node(&right_indices, depth + 1, nodes, importances, rng);

        nodes[current_idx].left = left_idx;
        nodes[current_idx].right = right_idx;

        current_idx as i32
    }

    /// Find the best split over up to `max_features` non-constant features
    fn find_best_split(
        &self,
        indices: &[usize],
        parent_impurity: f64,
        total: f64,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let mut features: Vec<usize> = (0..self.feature_count).collect();
        features.shuffle(rng);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0usize;

        for feature_idx in features {
            if visited >= self.config.max_features {
                break;
            }

            let mut sorted: Vec<usize> = indices.to_vec();
            sorted.sort_by(|&a, &b| self.x[a][feature_idx].total_cmp(&self.x[b][feature_idx]));

            let first = self.x[sorted[0]][feature_idx];
            let last = self.x[sorted[sorted.len() - 1]][feature_idx];
            if first == last {
                // Constant features do not count against max_features.
                continue;
            }
            visited += 1;

            let mut left_counts = vec![0.0f64; self.n_classes];
            let mut left_weight = 0.0f64;
            let right_total_counts = self.class_weights(&sorted);

            for pos in 0..sorted.len() - 1 {
                let idx = sorted[pos];
                let w = self.weights[idx];
                left_counts[self.y[idx]] += w;
                left_weight += w;

                let value = self.x[idx][feature_idx];
                let next_value = self.x[sorted[pos + 1]][feature_idx];
                if value == next_value {
                    continue;
                }

                let left_n = pos + 1;
                let right_n = sorted.len() - left_n;
                if left_n < self.config.min_samples_leaf || right_n < self.config.min_samples_leaf {
                    continue;
                }

                let right_counts: Vec<f64> = right_total_counts
                    .iter()
                    .zip(&left_counts)
                    .map(|(t, l)| t - l)
                    .collect();
                let right_weight = total - left_weight;

                let child_impurity = (left_weight / total) * gini(&left_counts, left_weight)
                    + (right_weight / total) * gini(&right_counts, right_weight);
                let improvement = parent_impurity - child_impurity;

                let candidate =
                    SplitCandidate::new(feature_idx, midpoint(value, next_value), improvement);
                if best.as_ref().map_or(true, |current| candidate.beats(current)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn partition(&self, indices: &[usize], feature_idx: usize, threshold: f32) -> (Vec<usize>, Vec<usize>) {
        indices
            .iter()
            .partition(|&&idx| self.x[idx][feature_idx] <= threshold)
    }

    /// Weighted class histogram
    fn class_weights(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0f64; self.n_classes];
        for &idx in indices {
            counts[self.y[idx]] += self.weights[idx];
        }
        counts
    }
}

/// Threshold halfway between two sorted values, never equal to the upper one
fn midpoint(low: f32, high: f32) -> f32 {
    let mid = low + (high - low) / 2.0;
    if mid >= high || !mid.is_finite() {
        low
    } else {
        mid
    }
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total) * (c / total)).sum::<f64>()
}

fn distribution(counts: &[f64], total: f64) -> Vec<f32> {
    if total <= 0.0 {
        return vec![1.0 / counts.len().max(1) as f32; counts.len()];
    }
    counts.iter().map(|c| (c / total) as f32).collect()
}
