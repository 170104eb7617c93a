//! Bootstrap-aggregated regression trees.
//!
//! Each tree is a CART regressor grown on a bootstrap sample of the training
//! rows; splits minimise the summed squared error of the two children and
//! leaves predict the mean target. All randomness comes from a single
//! `StdRng` seeded from [`ForestParams::seed`], so fitting the same data with
//! the same parameters always yields the same forest.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PredictionError, Result};
use crate::ml::DEFAULT_SEED;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Unlimited when `None`.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Frame {
    node: usize,
    rows: Vec<usize>,
    depth: usize,
}

impl RegressionTree {
    fn grow(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, rows: Vec<usize>, params: &ForestParams) -> Self {
        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut stack = vec![Frame {
            node: 0,
            rows,
            depth: 0,
        }];

        while let Some(Frame { node, rows, depth }) = stack.pop() {
            let value = mean(rows.iter().map(|&r| y[r]));
            let depth_exhausted = params.max_depth.map_or(false, |max| depth >= max);

            if depth_exhausted || rows.len() < params.min_samples_split.max(2) {
                nodes[node] = Node::Leaf { value };
                continue;
            }

            match best_split(x, y, &rows) {
                Some(split) => {
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .partition(|&&r| x[[r, split.feature]] <= split.threshold);

                    let left = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });
                    let right = nodes.len();
                    nodes.push(Node::Leaf { value: 0.0 });

                    nodes[node] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left,
                        right,
                    };
                    stack.push(Frame {
                        node: left,
                        rows: left_rows,
                        depth: depth + 1,
                    });
                    stack.push(Frame {
                        node: right,
                        rows: right_rows,
                        depth: depth + 1,
                    });
                }
                None => nodes[node] = Node::Leaf { value },
            }
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children must come after their parent, so traversal always ends.
    fn check_structure(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split {
                feature, left, right, ..
            } = node
            {
                if *feature >= n_features {
                    return Err(format!(
                        "node {idx} splits on feature {feature}, model has {n_features}"
                    ));
                }
                for child in [*left, *right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {idx} points at invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

struct Split {
    feature: usize,
    threshold: f64,
}

/// Finds the split with the lowest summed squared error, or `None` when no
/// split improves on the parent (constant targets or constant features).
fn best_split(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, rows: &[usize]) -> Option<Split> {
    let n = rows.len() as f64;
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    let total_sq: f64 = rows.iter().map(|&r| y[r] * y[r]).sum();
    let parent_sse = total_sq - total * total / n;
    if parent_sse <= f64::EPSILON * total_sq.max(1.0) {
        return None;
    }

    let mut best: Option<(f64, Split)> = None;
    let mut order = rows.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for i in 1..order.len() {
            let prev = order[i - 1];
            left_sum += y[prev];
            left_sq += y[prev] * y[prev];

            let lo = x[[prev, feature]];
            let hi = x[[order[i], feature]];
            if hi <= lo {
                continue;
            }

            let n_left = i as f64;
            let n_right = n - n_left;
            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if best.as_ref().map_or(true, |(best_sse, _)| sse < *best_sse) {
                best = Some((
                    sse,
                    Split {
                        feature,
                        threshold: lo + (hi - lo) / 2.0,
                    },
                ));
            }
        }
    }

    best.filter(|(sse, _)| *sse < parent_sse).map(|(_, split)| split)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Ensemble of regression trees averaged at prediction time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, params: ForestParams) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(PredictionError::NoTrainingRows);
        }
        if x.nrows() != y.len() {
            return Err(PredictionError::FeatureMismatch {
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.nrows();
        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::grow(x, y, sample, &params)
            })
            .collect();

        Ok(Self {
            params,
            n_features: x.ncols(),
            trees,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Validates a deserialized forest before it is used for scoring.
    pub fn check_structure(&self) -> std::result::Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        self.trees
            .iter()
            .enumerate()
            .try_for_each(|(idx, tree)| {
                tree.check_structure(self.n_features)
                    .map_err(|reason| format!("tree {idx}: {reason}"))
            })
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<f64> {
        if row.len() != self.n_features {
            return Err(PredictionError::FeatureMismatch {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(PredictionError::NotTrained);
        }
        let total: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        x.axis_iter(Axis(0))
            .map(|row| self.predict_row(row))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }
}
