//! Leaf-wise regression trees fitted to boosting gradients
//!
//! The tree structure is chosen on the gradients (unit hessian, so the gain
//! of a split is the reduction in squared-gradient mass). Leaf outputs are
//! assigned afterwards by the booster, which lets the quantile objective
//! renew each leaf from the residuals of the rows that landed in it.

use crate::matrix::FeatureMatrix;
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Structural limits for a single tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum number of leaves
    pub max_leaves: usize,
    /// Minimum number of rows on each side of a split
    pub min_data_in_leaf: usize,
    /// Minimum gain a split must exceed
    pub min_gain_to_split: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_leaves: 31,
            min_data_in_leaf: 20,
            min_gain_to_split: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
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

/// Rows of the training set that ended in one leaf
#[derive(Debug, Clone)]
pub struct LeafRows {
    /// Node index of the leaf
    pub node: usize,
    /// Training row indices in the leaf, ascending
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct OpenLeaf {
    node: usize,
    rows: Vec<usize>,
    best: Option<SplitCandidate>,
}

/// Binary regression tree
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree leaf-wise on `gradients`, using only `rows` and `features`.
    ///
    /// All leaves start with an output of zero; the caller sets them with
    /// [`RegressionTree::set_leaf_value`].
    pub fn grow(
        x: &FeatureMatrix,
        gradients: &[f64],
        rows: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Result<(Self, Vec<LeafRows>)> {
        if gradients.len() != x.n_rows() {
            return Err(MathError::InvalidInput(format!(
                "Got {} gradients for {} rows",
                gradients.len(),
                x.n_rows()
            )));
        }
        if rows.is_empty() {
            return Err(MathError::InsufficientData(
                "Cannot grow a tree without rows".to_string(),
            ));
        }
        if params.max_leaves == 0 {
            return Err(MathError::InvalidInput(
                "max_leaves must be at least 1".to_string(),
            ));
        }

        let mut nodes = vec![Node::Leaf { value: 0.0 }];
        let mut open = vec![OpenLeaf {
            node: 0,
            rows: rows.to_vec(),
            best: best_split(x, gradients, rows, features, params),
        }];
        let mut n_leaves = 1;

        while n_leaves < params.max_leaves {
            // highest gain wins, earliest leaf on ties
            let chosen = open
                .iter()
                .enumerate()
                .filter_map(|(i, leaf)| leaf.best.map(|s| (i, s.gain)))
                .fold(None, |acc: Option<(usize, f64)>, (i, gain)| match acc {
                    Some((_, best)) if best >= gain => acc,
                    _ => Some((i, gain)),
                });

            let Some((idx, _)) = chosen else {
                break;
            };

            let leaf = open.remove(idx);
            let split = match leaf.best {
                Some(split) => split,
                None => break,
            };

            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = leaf
                .rows
                .iter()
                .copied()
                .partition(|&r| x.get(r, split.feature) <= split.threshold);

            let left = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            let right = nodes.len();
            nodes.push(Node::Leaf { value: 0.0 });
            nodes[leaf.node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            let left_best = best_split(x, gradients, &left_rows, features, params);
            let right_best = best_split(x, gradients, &right_rows, features, params);
            open.push(OpenLeaf {
                node: left,
                rows: left_rows,
                best: left_best,
            });
            open.push(OpenLeaf {
                node: right,
                rows: right_rows,
                best: right_best,
            });
            n_leaves += 1;
        }

        let leaves = open
            .into_iter()
            .map(|leaf| LeafRows {
                node: leaf.node,
                rows: leaf.rows,
            })
            .collect();

        Ok((Self { nodes }, leaves))
    }

    /// Set the output of a leaf node
    pub fn set_leaf_value(&mut self, node: usize, value: f64) -> Result<()> {
        match self.nodes.get_mut(node) {
            Some(Node::Leaf { value: v }) => {
                *v = value;
                Ok(())
            }
            _ => Err(MathError::InvalidInput(format!(
                "Node {} is not a leaf",
                node
            ))),
        }
    }

    /// Output for a single feature row
    pub fn predict_row(&self, row: &[f64]) -> f64 {
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
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Number of leaves
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Add this tree's split counts per feature to `counts`
    pub fn accumulate_split_counts(&self, counts: &mut [u32]) {
        for node in &self.nodes {
            if let Node::Split { feature, .. } = node {
                counts[*feature] += 1;
            }
        }
    }
}

fn best_split(
    x: &FeatureMatrix,
    gradients: &[f64],
    rows: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let n = rows.len();
    let min_leaf = params.min_data_in_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }

    let total: f64 = rows.iter().map(|&r| gradients[r]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;

    for &feature in features {
        let mut order: Vec<usize> = rows.to_vec();
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

        let mut left_sum = 0.0;
        for i in 0..n - 1 {
            let current = x.get(order[i], feature);
            if current.is_nan() {
                break;
            }
            left_sum += gradients[order[i]];

            let next = x.get(order[i + 1], feature);
            if current == next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                - parent_score;
            if gain <= params.min_gain_to_split {
                continue;
            }

            if best.map_or(true, |b| gain > b.gain) {
                let threshold = if next.is_nan() {
                    current
                } else {
                    let mid = current + (next - current) / 2.0;
                    if mid >= next {
                        current
                    } else {
                        mid
                    }
                };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (FeatureMatrix, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let gradients = (0..40).map(|i| if i < 20 { -1.0 } else { 1.0 }).collect();
        (FeatureMatrix::from_rows(&rows).unwrap(), gradients)
    }

    #[test]
    fn splits_on_informative_feature() {
        let (x, g) = step_data();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            max_leaves: 2,
            min_data_in_leaf: 5,
            min_gain_to_split: 0.0,
        };
        let (mut tree, leaves) = RegressionTree::grow(&x, &g, &rows, &[0, 1], &params).unwrap();

        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].rows, (0..20).collect::<Vec<_>>());

        tree.set_leaf_value(leaves[0].node, -1.0).unwrap();
        tree.set_leaf_value(leaves[1].node, 1.0).unwrap();
        assert_eq!(tree.predict_row(&[3.0, 0.0]), -1.0);
        assert_eq!(tree.predict_row(&[30.0, 0.0]), 1.0);

        let mut counts = vec![0; 2];
        tree.accumulate_split_counts(&mut counts);
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn min_data_in_leaf_prevents_splits() {
        let (x, g) = step_data();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            min_data_in_leaf: 21,
            ..TreeParams::default()
        };
        let (tree, leaves) = RegressionTree::grow(&x, &g, &rows, &[0, 1], &params).unwrap();
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(leaves[0].rows.len(), 40);
    }

    #[test]
    fn leaf_value_on_split_node_is_rejected() {
        let (x, g) = step_data();
        let rows: Vec<usize> = (0..40).collect();
        let params = TreeParams {
            max_leaves: 2,
            min_data_in_leaf: 5,
            min_gain_to_split: 0.0,
        };
        let (mut tree, _) = RegressionTree::grow(&x, &g, &rows, &[0], &params).unwrap();
        assert!(tree.set_leaf_value(0, 1.0).is_err());
    }
}
