//! Random-forest regression on raw feature magnitudes.
//!
//! An ensemble of variance-reduction decision trees, each fit on a bootstrap
//! resample of the training rows. Tree count and the random seed are fixed
//! by the caller, and per-tree seeds are drawn from the base seed *before*
//! the trees are fitted in parallel, so a given (data, seed) pair always
//! produces the same forest regardless of thread scheduling.
//!
//! The model consumes positional vectors and cannot tell a reordered column
//! from a real value; beyond a width check it performs no input validation.
//! Callers must go through the feature assembler, whose reindex step is the
//! structural guarantee against column mismatch.

use log::info;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from fitting or applying the regressor.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("The model has not been fitted yet.")]
    NotFitted,
    #[error("Cannot fit a model on an empty training set.")]
    EmptyTrainingSet,
    #[error("Feature matrix has {x_rows} rows but the target has {y_rows}.")]
    LengthMismatch { x_rows: usize, y_rows: usize },
    #[error("Input has {found} feature columns, but the model was fitted on {expected}.")]
    MismatchedColumnCount { found: usize, expected: usize },
}

/// One node of a flattened decision tree.
///
/// Nodes live in a single arena; `left`/`right` are arena indices. The root
/// is node 0, so a node whose `left` is 0 can only be a leaf, in which case
/// `value` holds the mean target of the training rows that reached it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TreeNode {
    feature: usize,
    threshold: f64,
    left: usize,
    right: usize,
    value: f64,
}

impl TreeNode {
    fn leaf(value: f64) -> Self {
        TreeNode {
            feature: 0,
            threshold: 0.0,
            left: 0,
            right: 0,
            value,
        }
    }

    fn is_leaf(&self) -> bool {
        self.left == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        indices: Vec<usize>,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
    ) -> Self {
        let mut tree = DecisionTree { nodes: Vec::new() };
        tree.build(x, y, indices, 0, max_depth, min_samples_leaf);
        tree
    }

    /// Recursively grows the subtree for `indices` and returns its arena id.
    fn build(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        indices: Vec<usize>,
        depth: usize,
        max_depth: Option<usize>,
        min_samples_leaf: usize,
    ) -> usize {
        let node_id = self.nodes.len();
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / indices.len() as f64;
        self.nodes.push(TreeNode::leaf(mean));

        let depth_exhausted = max_depth.is_some_and(|limit| depth >= limit);
        if depth_exhausted || indices.len() < 2 * min_samples_leaf.max(1) {
            return node_id;
        }

        let Some(split) = best_split(x, y, &indices, min_samples_leaf) else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);

        let left = self.build(x, y, left_idx, depth + 1, max_depth, min_samples_leaf);
        let right = self.build(x, y, right_idx, depth + 1, max_depth, min_samples_leaf);
        self.nodes[node_id] = TreeNode {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            value: mean,
        };
        node_id
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = &self.nodes[0];
        while !node.is_leaf() {
            node = if row[node.feature] <= node.threshold {
                &self.nodes[node.left]
            } else {
                &self.nodes[node.right]
            };
        }
        node.value
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    sse: f64,
}

/// Exhaustive best-split search by sum-of-squared-error reduction.
///
/// For each feature the candidate rows are sorted by value and every
/// boundary between distinct values is scored with prefix sums, keeping the
/// split with the smallest combined child SSE.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<Split> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;
    if parent_sse <= f64::EPSILON {
        // Pure node: every target identical, nothing to gain.
        return None;
    }

    let mut best: Option<Split> = None;
    let mut order: Vec<usize> = Vec::with_capacity(n);
    for feature in 0..x.ncols() {
        order.clear();
        order.extend_from_slice(indices);
        order.sort_unstable_by(|&a, &b| {
            x[[a, feature]]
                .partial_cmp(&x[[b, feature]])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 1..n {
            let prev = order[pos - 1];
            left_sum += y[prev];
            left_sq += y[prev] * y[prev];

            let lo = x[[prev, feature]];
            let hi = x[[order[pos], feature]];
            if hi <= lo || pos < min_samples_leaf || n - pos < min_samples_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / pos as f64;
            let right_sse = right_sq - right_sum * right_sum / (n - pos) as f64;
            let sse = left_sse + right_sse;
            if best.as_ref().is_none_or(|b| sse < b.sse) {
                best = Some(Split {
                    feature,
                    threshold: lo + (hi - lo) / 2.0,
                    sse,
                });
            }
        }
    }

    // A split that does not improve on the parent is not worth taking.
    best.filter(|b| b.sse < parent_sse)
}

/// An ensemble of decision trees averaged into a single price estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_leaf: usize,
    seed: u64,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForestRegressor {
    /// Creates an unfitted forest with the given tree count and seed.
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        RandomForestRegressor {
            n_estimators,
            max_depth: None,
            min_samples_leaf: 1,
            seed,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf.max(1);
        self
    }

    /// Number of feature columns the forest was fitted on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Fits the forest from scratch on the full matrix. There is no
    /// incremental update; retraining replaces every tree.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> Result<(), ModelError> {
        let n_rows = x.nrows();
        if n_rows == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if n_rows != y.len() {
            return Err(ModelError::LengthMismatch {
                x_rows: n_rows,
                y_rows: y.len(),
            });
        }

        // Per-tree seeds come from a single sequential draw so the parallel
        // fit below stays reproducible.
        let mut rng = StdRng::seed_from_u64(self.seed);
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.next_u64()).collect();

        info!(
            "Fitting {} trees on {} rows x {} features (seed {})",
            self.n_estimators,
            n_rows,
            x.ncols(),
            self.seed
        );

        let max_depth = self.max_depth;
        let min_samples_leaf = self.min_samples_leaf;
        self.trees = tree_seeds
            .par_iter()
            .map(|&tree_seed| {
                let mut tree_rng = StdRng::seed_from_u64(tree_seed);
                let bootstrap: Vec<usize> =
                    (0..n_rows).map(|_| tree_rng.gen_range(0..n_rows)).collect();
                DecisionTree::fit(x, y, bootstrap, max_depth, min_samples_leaf)
            })
            .collect();
        self.n_features = x.ncols();
        Ok(())
    }

    /// Predicts a value for every row of `x`.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(ModelError::MismatchedColumnCount {
                found: x.ncols(),
                expected: self.n_features,
            });
        }

        let predictions = x
            .rows()
            .into_iter()
            .map(|row| {
                self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
                    / self.trees.len() as f64
            })
            .collect();
        Ok(Array1::from_vec(predictions))
    }

    /// Convenience path for the single-row inference procedure.
    pub fn predict_one(&self, x: ArrayView2<'_, f64>) -> Result<f64, ModelError> {
        let predictions = self.predict(x)?;
        predictions.first().copied().ok_or(ModelError::NotFitted)
    }
}

/// Coefficient of determination of `predicted` against `actual`.
///
/// Returns 0.0 for a zero-variance target, where R² is undefined.
pub fn r_squared(actual: ArrayView1<'_, f64>, predicted: ArrayView1<'_, f64>) -> f64 {
    let mean = actual.sum() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|&a| (a - mean) * (a - mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(&a, &p)| (a - p) * (a - p))
        .sum();
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2, array};

    /// y = 3x with a little structure, enough rows for stable bootstraps.
    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let xs: Vec<f64> = (0..60).map(|i| i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|v| 3.0 * v).collect();
        (
            Array2::from_shape_vec((60, 1), xs).unwrap(),
            Array1::from_vec(ys),
        )
    }

    #[test]
    fn fits_a_simple_relationship() {
        let (x, y) = linear_data();
        let mut forest = RandomForestRegressor::new(25, 42);
        forest.fit(x.view(), y.view()).unwrap();

        let query = array![[30.0]];
        let prediction = forest.predict_one(query.view()).unwrap();
        assert_abs_diff_eq!(prediction, 90.0, epsilon = 10.0);
    }

    #[test]
    fn same_seed_reproduces_identical_forest() {
        let (x, y) = linear_data();
        let mut a = RandomForestRegressor::new(10, 7);
        let mut b = RandomForestRegressor::new(10, 7);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a, b);

        let query = array![[17.5]];
        assert_eq!(
            a.predict_one(query.view()).unwrap(),
            b.predict_one(query.view()).unwrap()
        );
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let (x, y) = linear_data();
        let mut forest = RandomForestRegressor::new(5, 1);
        forest.fit(x.view(), y.view()).unwrap();

        let wide = array![[1.0, 2.0]];
        assert!(matches!(
            forest.predict(wide.view()),
            Err(ModelError::MismatchedColumnCount {
                found: 2,
                expected: 1
            })
        ));
    }

    #[test]
    fn unfitted_and_empty_inputs_are_errors() {
        let forest = RandomForestRegressor::new(5, 1);
        let query = array![[1.0]];
        assert!(matches!(
            forest.predict(query.view()),
            Err(ModelError::NotFitted)
        ));

        let mut forest = RandomForestRegressor::new(5, 1);
        let empty_x = Array2::<f64>::zeros((0, 1));
        let empty_y = Array1::<f64>::zeros(0);
        assert!(matches!(
            forest.fit(empty_x.view(), empty_y.view()),
            Err(ModelError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn pure_targets_collapse_to_a_leaf() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let y = Array1::from_vec(vec![5.0; 4]);
        let mut forest = RandomForestRegressor::new(3, 0);
        forest.fit(x.view(), y.view()).unwrap();
        let query = array![[99.0]];
        assert_abs_diff_eq!(forest.predict_one(query.view()).unwrap(), 5.0);
    }

    #[test]
    fn r_squared_behaves() {
        let actual = array![1.0, 2.0, 3.0, 4.0];
        assert_abs_diff_eq!(r_squared(actual.view(), actual.view()), 1.0);

        let mean_only = array![2.5, 2.5, 2.5, 2.5];
        assert_abs_diff_eq!(r_squared(actual.view(), mean_only.view()), 0.0);

        let constant = array![3.0, 3.0, 3.0];
        let guess = array![1.0, 2.0, 3.0];
        assert_eq!(r_squared(constant.view(), guess.view()), 0.0);
    }
}
