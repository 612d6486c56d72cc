//! CART regression trees and the two classic ensembles built from them:
//! bootstrap aggregation and gradient boosting on squared loss.

use crate::{mean, MathError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted regression tree
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    root: Node,
}

impl RegressionTree {
    /// Grow a tree on `rows`/`targets`
    pub fn fit(rows: &[Vec<f64>], targets: &[f64], params: TreeParams) -> Result<Self> {
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(MathError::InvalidInput(format!(
                "Tree needs matching non-empty rows ({}) and targets ({})",
                rows.len(),
                targets.len()
            )));
        }
        let indices: Vec<usize> = (0..rows.len()).collect();
        let root = grow(rows, targets, &indices, params, 0);
        Ok(Self { root })
    }

    /// Predict a single feature vector
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let x = features.get(*feature).copied().unwrap_or(0.0);
                    node = if x <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Number of leaves, mostly useful in tests
    pub fn leaf_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf(_) => 1,
                Node::Split { left, right, .. } => count(left) + count(right),
            }
        }
        count(&self.root)
    }
}

fn leaf_value(targets: &[f64], indices: &[usize]) -> f64 {
    let values: Vec<f64> = indices.iter().map(|&i| targets[i]).collect();
    mean(&values).unwrap_or(0.0)
}

fn grow(rows: &[Vec<f64>], targets: &[f64], indices: &[usize], params: TreeParams, depth: usize) -> Node {
    if depth >= params.max_depth || indices.len() < 2 * params.min_samples_leaf.max(1) {
        return Node::Leaf(leaf_value(targets, indices));
    }

    let Some((feature, threshold)) = best_split(rows, targets, indices, params.min_samples_leaf.max(1)) else {
        return Node::Leaf(leaf_value(targets, indices));
    };

    let (left, right): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(rows, targets, &left, params, depth + 1)),
        right: Box::new(grow(rows, targets, &right, params, depth + 1)),
    }
}

/// Exhaustive search for the split with the lowest summed squared error
fn best_split(rows: &[Vec<f64>], targets: &[f64], indices: &[usize], min_leaf: usize) -> Option<(usize, f64)> {
    let features = rows[indices[0]].len();
    let total_sum: f64 = indices.iter().map(|&i| targets[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| targets[i] * targets[i]).sum();
    let n = indices.len() as f64;
    let parent_sse = total_sq - total_sum * total_sum / n;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut order = indices.to_vec();

    for feature in 0..features {
        order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for (pos, &i) in order.iter().enumerate().take(order.len() - 1) {
            left_sum += targets[i];
            left_sq += targets[i] * targets[i];

            let left_n = (pos + 1) as f64;
            let right_n = n - left_n;
            if pos + 1 < min_leaf || order.len() - pos - 1 < min_leaf {
                continue;
            }

            let here = rows[i][feature];
            let next = rows[order[pos + 1]][feature];
            if here == next {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n) + (right_sq - right_sum * right_sum / right_n);

            if best.map_or(true, |(_, _, b)| sse < b) {
                best = Some((feature, (here + next) / 2.0, sse));
            }
        }
    }

    best.filter(|&(_, _, sse)| sse < parent_sse - 1e-12)
        .map(|(feature, threshold, _)| (feature, threshold))
}

/// How the trees of an ensemble are combined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EnsembleKind {
    /// Average of trees grown on bootstrap resamples
    Bagging,
    /// Additive trees fitted to residuals with shrinkage
    Boosting { learning_rate: f64 },
}

/// A fitted tree ensemble
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    kind: EnsembleKind,
    base: f64,
    trees: Vec<RegressionTree>,
}

impl TreeEnsemble {
    /// Fit `n_estimators` trees. `seed` makes bootstrap sampling reproducible.
    pub fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        kind: EnsembleKind,
        n_estimators: usize,
        params: TreeParams,
        seed: u64,
    ) -> Result<Self> {
        if n_estimators == 0 {
            return Err(MathError::InvalidInput(
                "Ensemble needs at least one estimator".to_string(),
            ));
        }
        if rows.is_empty() || rows.len() != targets.len() {
            return Err(MathError::InvalidInput(
                "Ensemble needs matching non-empty rows and targets".to_string(),
            ));
        }

        let mut trees = Vec::with_capacity(n_estimators);
        match kind {
            EnsembleKind::Bagging => {
                let mut rng = StdRng::seed_from_u64(seed);
                let n = rows.len();
                for _ in 0..n_estimators {
                    let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                    let sample_rows: Vec<Vec<f64>> = sample.iter().map(|&i| rows[i].clone()).collect();
                    let sample_targets: Vec<f64> = sample.iter().map(|&i| targets[i]).collect();
                    trees.push(RegressionTree::fit(&sample_rows, &sample_targets, params)?);
                }
                Ok(Self { kind, base: 0.0, trees })
            }
            EnsembleKind::Boosting { learning_rate } => {
                if learning_rate <= 0.0 || learning_rate > 1.0 {
                    return Err(MathError::InvalidInput(
                        "Learning rate must be in (0, 1]".to_string(),
                    ));
                }
                let base = mean(targets).unwrap_or(0.0);
                let mut fitted = vec![base; targets.len()];
                for _ in 0..n_estimators {
                    let residuals: Vec<f64> = targets.iter().zip(&fitted).map(|(y, f)| y - f).collect();
                    let tree = RegressionTree::fit(rows, &residuals, params)?;
                    for (value, row) in fitted.iter_mut().zip(rows) {
                        *value += learning_rate * tree.predict(row);
                    }
                    trees.push(tree);
                }
                Ok(Self { kind, base, trees })
            }
        }
    }

    /// Predict a single feature vector
    pub fn predict(&self, features: &[f64]) -> f64 {
        match self.kind {
            EnsembleKind::Bagging => {
                let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
                sum / self.trees.len() as f64
            }
            EnsembleKind::Boosting { learning_rate } => {
                self.base
                    + learning_rate
                        * self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
