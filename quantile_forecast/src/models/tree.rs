//! Histogram-binned regression trees used as boosting weak learners

use crate::error::{ForecastError, Result};
use crate::features::FeatureMatrix;
use serde::{Deserialize, Serialize};

/// Per-feature split candidates learned from the training matrix.
///
/// A value falls in bin `b` when `edges[b - 1] < v <= edges[b]`; values above
/// the last edge fall in the final bin.
#[derive(Debug, Clone)]
pub(crate) struct FeatureBins {
    edges: Vec<Vec<f64>>,
}

impl FeatureBins {
    pub(crate) fn fit(x: &FeatureMatrix, max_bins: usize) -> Self {
        let edges = (0..x.n_cols())
            .map(|col| {
                let mut values: Vec<f64> = x.rows().map(|row| row[col]).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                values.dedup();

                let cuts: Vec<usize> = if values.len() <= max_bins {
                    (1..values.len()).collect()
                } else {
                    let mut cuts: Vec<usize> = (1..max_bins)
                        .map(|b| b * values.len() / max_bins)
                        .collect();
                    cuts.dedup();
                    cuts
                };

                // Midpoints between neighbouring distinct values
                cuts.into_iter()
                    .map(|i| values[i - 1] + (values[i] - values[i - 1]) / 2.0)
                    .collect()
            })
            .collect();

        Self { edges }
    }

    pub(crate) fn n_bins(&self, feature: usize) -> usize {
        self.edges[feature].len() + 1
    }

    /// Upper edge of `bin`, the raw-value threshold of a split after it
    pub(crate) fn threshold(&self, feature: usize, bin: usize) -> f64 {
        self.edges[feature][bin]
    }

    /// Bin index of every value, row-major like the source matrix
    pub(crate) fn bin_matrix(&self, x: &FeatureMatrix) -> Vec<u16> {
        x.rows()
            .flat_map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(col, &v)| self.edges[col].partition_point(|e| *e < v) as u16)
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Binary regression tree stored as a flat node list, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walk the tree for one row; values `<= threshold` go left
    pub(crate) fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Reject node lists `predict_row` cannot walk to a leaf: every child
    /// must point forward and stay inside the list
    pub(crate) fn check_structure(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ForecastError::DataError("Tree has no nodes".to_string()));
        }
        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { left, right, .. } = node {
                for child in [*left, *right] {
                    if child <= index || child >= self.nodes.len() {
                        return Err(ForecastError::DataError(format!(
                            "Node {} links to invalid child {} ({} nodes)",
                            index,
                            child,
                            self.nodes.len()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Largest feature index referenced by any split
    pub(crate) fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                TreeNode::Split { feature, .. } => Some(*feature),
                TreeNode::Leaf { .. } => None,
            })
            .max()
    }
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

/// Grows one tree on pre-binned data, fitting the split structure to
/// gradients and letting the caller choose each leaf's value
pub(crate) struct TreeBuilder<'a> {
    pub(crate) bins: &'a FeatureBins,
    pub(crate) binned: &'a [u16],
    pub(crate) n_cols: usize,
    pub(crate) max_depth: usize,
    pub(crate) min_samples_leaf: usize,
}

impl<'a> TreeBuilder<'a> {
    pub(crate) fn build<F>(
        &self,
        rows: &[usize],
        gradients: &[f64],
        features: &[usize],
        leaf_value: F,
    ) -> RegressionTree
    where
        F: Fn(&[usize]) -> f64,
    {
        let mut nodes = Vec::new();
        self.grow(&mut nodes, rows, 0, gradients, features, &leaf_value);
        RegressionTree { nodes }
    }

    fn grow<F>(
        &self,
        nodes: &mut Vec<TreeNode>,
        rows: &[usize],
        depth: usize,
        gradients: &[f64],
        features: &[usize],
        leaf_value: &F,
    ) -> usize
    where
        F: Fn(&[usize]) -> f64,
    {
        let index = nodes.len();
        nodes.push(TreeNode::Leaf { value: 0.0 });

        let split = if depth < self.max_depth && rows.len() >= 2 * self.min_samples_leaf {
            self.best_split(rows, gradients, features)
        } else {
            None
        };

        match split {
            None => {
                nodes[index] = TreeNode::Leaf {
                    value: leaf_value(rows),
                };
            }
            Some(split) => {
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                    .iter()
                    .copied()
                    .partition(|&row| self.bin_of(row, split.feature) <= split.bin);

                let left = self.grow(nodes, &left_rows, depth + 1, gradients, features, leaf_value);
                let right = self.grow(nodes, &right_rows, depth + 1, gradients, features, leaf_value);
                nodes[index] = TreeNode::Split {
                    feature: split.feature,
                    threshold: self.bins.threshold(split.feature, split.bin),
                    left,
                    right,
                };
            }
        }

        index
    }

    fn bin_of(&self, row: usize, feature: usize) -> usize {
        self.binned[row * self.n_cols + feature] as usize
    }

    /// Split maximising the reduction in squared error of the gradients
    fn best_split(&self, rows: &[usize], gradients: &[f64], features: &[usize]) -> Option<SplitCandidate> {
        let total_sum: f64 = rows.iter().map(|&r| gradients[r]).sum();
        let total_count = rows.len();
        let parent_score = total_sum * total_sum / total_count as f64;

        let mut best: Option<SplitCandidate> = None;
        for &feature in features {
            let n_bins = self.bins.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let mut sums = vec![0.0; n_bins];
            let mut counts = vec![0usize; n_bins];
            for &row in rows {
                let bin = self.bin_of(row, feature);
                sums[bin] += gradients[row];
                counts[bin] += 1;
            }

            let mut left_sum = 0.0;
            let mut left_count = 0;
            for bin in 0..n_bins - 1 {
                left_sum += sums[bin];
                left_count += counts[bin];
                let right_count = total_count - left_count;
                if left_count < self.min_samples_leaf {
                    continue;
                }
                if right_count < self.min_samples_leaf {
                    break;
                }

                let right_sum = total_sum - left_sum;
                let gain = left_sum * left_sum / left_count as f64
                    + right_sum * right_sum / right_count as f64
                    - parent_score;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate { feature, bin, gain });
                }
            }
        }

        best
    }
}
