//! Second-order regression trees, the weak learners of [`crate::gbt`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    /// Rows with `row[feature] < threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Arena-allocated tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Leaf { value }) => return *value,
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    index = if x < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], index: usize) -> usize {
            match nodes.get(index) {
                Some(TreeNode::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Growth parameters for one tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowParams {
    pub max_depth: u32,
    pub learning_rate: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    pub min_child_weight: f64,
    pub gamma: f64,
}

impl GrowParams {
    fn soft_threshold(&self, g: f64) -> f64 {
        if g > self.reg_alpha {
            g - self.reg_alpha
        } else if g < -self.reg_alpha {
            g + self.reg_alpha
        } else {
            0.0
        }
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        let t = self.soft_threshold(g);
        t * t / (h + self.reg_lambda)
    }

    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -self.soft_threshold(g) / denom * self.learning_rate
    }
}

/// Gradient statistics of the training rows.
pub(crate) struct GrowInput<'a> {
    pub rows: &'a [Vec<f64>],
    pub grad: &'a [f64],
    pub hess: &'a [f64],
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grow one tree over the sampled rows, considering only the sampled features.
///
/// Splits are chosen by exact greedy search on the second-order gain; a split is
/// kept only when its gain (after `gamma`) is positive and both children carry at
/// least `min_child_weight` hessian.
pub(crate) fn grow(input: &GrowInput<'_>, sample: Vec<usize>, features: &[usize], params: &GrowParams) -> RegressionTree {
    let mut nodes = Vec::new();
    build_node(input, sample, features, params, 0, &mut nodes);
    RegressionTree { nodes }
}

fn build_node(
    input: &GrowInput<'_>,
    sample: Vec<usize>,
    features: &[usize],
    params: &GrowParams,
    depth: u32,
    nodes: &mut Vec<TreeNode>,
) -> usize {
    let index = nodes.len();
    let g: f64 = sample.iter().map(|&i| input.grad[i]).sum();
    let h: f64 = sample.iter().map(|&i| input.hess[i]).sum();
    nodes.push(TreeNode::Leaf {
        value: params.leaf_weight(g, h),
    });

    if depth >= params.max_depth || sample.len() < 2 {
        return index;
    }
    let Some(best) = best_split(input, &sample, features, params, g, h) else {
        return index;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = sample
        .into_iter()
        .partition(|&i| input.rows[i][best.feature] < best.threshold);
    if left_rows.is_empty() || right_rows.is_empty() {
        return index;
    }

    let left = build_node(input, left_rows, features, params, depth + 1, nodes);
    let right = build_node(input, right_rows, features, params, depth + 1, nodes);
    nodes[index] = TreeNode::Split {
        feature: best.feature,
        threshold: best.threshold,
        left,
        right,
    };
    index
}

fn best_split(
    input: &GrowInput<'_>,
    sample: &[usize],
    features: &[usize],
    params: &GrowParams,
    g_total: f64,
    h_total: f64,
) -> Option<BestSplit> {
    let parent_score = params.score(g_total, h_total);
    let mut best: Option<BestSplit> = None;
    let mut order = sample.to_vec();

    for &feature in features {
        order.sort_by(|&a, &b| input.rows[a][feature].total_cmp(&input.rows[b][feature]));

        let mut g_left = 0.0;
        let mut h_left = 0.0;
        for pos in 0..order.len() - 1 {
            let i = order[pos];
            g_left += input.grad[i];
            h_left += input.hess[i];

            let here = input.rows[i][feature];
            let next = input.rows[order[pos + 1]][feature];
            if here >= next {
                continue;
            }
            let h_right = h_total - h_left;
            if h_left < params.min_child_weight || h_right < params.min_child_weight {
                continue;
            }

            let g_right = g_total - g_left;
            let gain = 0.5 * (params.score(g_left, h_left) + params.score(g_right, h_right) - parent_score) - params.gamma;
            if gain > 0.0 && best.as_ref().is_none_or(|b| gain > b.gain) {
                let mid = here + (next - here) / 2.0;
                let threshold = if mid > here { mid } else { next };
                best = Some(BestSplit {
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

    fn params() -> GrowParams {
        GrowParams {
            max_depth: 3,
            learning_rate: 1.0,
            reg_alpha: 0.0,
            reg_lambda: 0.0,
            min_child_weight: 1.0,
            gamma: 0.0,
        }
    }

    /// Gradients for squared error at a zero prediction.
    fn grads(targets: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (targets.iter().map(|y| -y).collect(), vec![1.0; targets.len()])
    }

    #[test]
    fn step_function_is_recovered_in_one_split() {
        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let targets = [1.0, 1.0, 1.0, 1.0, 9.0, 9.0, 9.0, 9.0];
        let (grad, hess) = grads(&targets);
        let input = GrowInput {
            rows: &rows,
            grad: &grad,
            hess: &hess,
        };

        let tree = grow(&input, (0..8).collect(), &[0], &params());
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.predict_row(&[2.0]), 1.0);
        assert_eq!(tree.predict_row(&[6.0]), 9.0);
        assert_eq!(tree.predict_row(&[3.5]), 9.0);
        assert_eq!(tree.predict_row(&[3.49]), 1.0);
    }

    #[test]
    fn constant_feature_never_splits() {
        let rows: Vec<Vec<f64>> = (0..6).map(|_| vec![5.0]).collect();
        let (grad, hess) = grads(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let input = GrowInput {
            rows: &rows,
            grad: &grad,
            hess: &hess,
        };
        let tree = grow(&input, (0..6).collect(), &[0], &params());
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[5.0]), 3.5);
    }

    #[test]
    fn min_child_weight_blocks_small_leaves() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let (grad, hess) = grads(&[0.0, 0.0, 0.0, 100.0]);
        let input = GrowInput {
            rows: &rows,
            grad: &grad,
            hess: &hess,
        };
        let strict = GrowParams {
            min_child_weight: 2.0,
            ..params()
        };
        let tree = grow(&input, (0..4).collect(), &[0], &strict);
        // Only the 2/2 split is allowed.
        assert_eq!(tree.predict_row(&[0.0]), 0.0);
        assert_eq!(tree.predict_row(&[3.0]), 50.0);
    }

    #[test]
    fn lambda_shrinks_leaf_values() {
        let p = GrowParams {
            reg_lambda: 1.0,
            learning_rate: 0.5,
            ..params()
        };
        // G = -9, H = 2 → -(-9) / 3 * 0.5
        assert_eq!(p.leaf_weight(-9.0, 2.0), 1.5);
    }

    #[test]
    fn tree_round_trips_through_json() {
        let rows: Vec<Vec<f64>> = (0..4).map(|i| vec![i as f64]).collect();
        let (grad, hess) = grads(&[1.0, 1.0, 5.0, 5.0]);
        let input = GrowInput {
            rows: &rows,
            grad: &grad,
            hess: &hess,
        };
        let tree = grow(&input, (0..4).collect(), &[0], &params());
        let json = serde_json::to_string(&tree).unwrap();
        let back: RegressionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
