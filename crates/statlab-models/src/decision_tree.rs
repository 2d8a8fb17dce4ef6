//! CART-style decision tree over two numeric features and a binary label.
//!
//! The tree is built bottom-up by pure recursion and returned by value: every
//! internal node owns its two children, there are no parent links and nothing
//! is mutated after construction.
//!
//! # Splitting
//!
//! At each node, candidate thresholds are the midpoints between consecutive
//! distinct values of each feature (evenly sub-sampled down to
//! [`TreeParams::max_thresholds`] when there are more). Samples with
//! `feature ≤ threshold` go left. The split with the lowest sample-weighted
//! Gini impurity wins; ties keep the first candidate in iteration order
//! (feature 0 before feature 1, ascending thresholds), which keeps trees
//! reproducible.
//!
//! # Stopping
//!
//! A node becomes a leaf when any of the following holds:
//!
//! - depth has reached `max_depth`
//! - it holds fewer than `min_samples_split` samples
//! - it is pure (one class count is zero)
//! - no candidate split lowers the weighted Gini below the node's own Gini

use serde::{Deserialize, Serialize};

/// Number of input features per sample.
pub const FEATURE_COUNT: usize = 2;

/// A labelled training sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeSample {
    pub features: [f64; FEATURE_COUNT],
    pub label: bool,
}

impl TreeSample {
    #[must_use]
    pub const fn new(x0: f64, x1: f64, label: bool) -> Self {
        Self {
            features: [x0, x1],
            label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Upper bound on candidate thresholds evaluated per feature.
    pub max_thresholds: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_split: 2,
            max_thresholds: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    /// Majority label; ties resolve to `false`.
    pub value: bool,
    pub samples: usize,
    pub gini: f64,
    /// Sample counts as `[negatives, positives]`.
    pub class_counts: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Internal {
    pub split_feature_index: usize,
    pub split_threshold: f64,
    pub left: Box<DecisionTreeNode>,
    pub right: Box<DecisionTreeNode>,
    pub samples: usize,
    pub gini: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionTreeNode {
    Leaf(Leaf),
    Internal(Internal),
}

impl DecisionTreeNode {
    #[must_use]
    pub fn samples(&self) -> usize {
        match self {
            Self::Leaf(leaf) => leaf.samples,
            Self::Internal(node) => node.samples,
        }
    }

    #[must_use]
    pub fn gini(&self) -> f64 {
        match self {
            Self::Leaf(leaf) => leaf.gini,
            Self::Internal(node) => node.gini,
        }
    }

    /// Number of edges on the longest root-to-leaf path.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Leaf(_) => 0,
            Self::Internal(node) => 1 + node.left.depth().max(node.right.depth()),
        }
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Internal(node) => node.left.leaf_count() + node.right.leaf_count(),
        }
    }

    /// All leaves in left-to-right order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Leaf> {
        match self {
            Self::Leaf(leaf) => vec![leaf],
            Self::Internal(node) => {
                let mut leaves = node.left.leaves();
                leaves.extend(node.right.leaves());
                leaves
            }
        }
    }

    /// Label predicted for `features`.
    #[must_use]
    pub fn predict(&self, features: &[f64; FEATURE_COUNT]) -> bool {
        let mut node = self;
        loop {
            match node {
                Self::Leaf(leaf) => return leaf.value,
                Self::Internal(internal) => {
                    node = if features[internal.split_feature_index] <= internal.split_threshold {
                        internal.left.as_ref()
                    } else {
                        internal.right.as_ref()
                    };
                }
            }
        }
    }
}

/// Gini impurity `1 - p₀² - p₁²` of a two-class count.
///
/// An empty node has impurity `0`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn gini(class_counts: [usize; 2]) -> f64 {
    let total = class_counts[0] + class_counts[1];
    if total == 0 {
        return 0.0;
    }
    let p0 = class_counts[0] as f64 / total as f64;
    let p1 = class_counts[1] as f64 / total as f64;
    1.0 - p0 * p0 - p1 * p1
}

fn class_counts<'a, I>(samples: I) -> [usize; 2]
where
    I: IntoIterator<Item = &'a TreeSample>,
{
    samples.into_iter().fold([0, 0], |mut counts, s| {
        counts[usize::from(s.label)] += 1;
        counts
    })
}

/// Builds a decision tree from `samples`.
///
/// An empty training set yields a single empty leaf.
///
/// # Examples
///
/// ```
/// use statlab_models::decision_tree::{TreeParams, TreeSample, build_tree};
///
/// let samples = [
///     TreeSample::new(1.0, 5.0, false),
///     TreeSample::new(2.0, 1.0, false),
///     TreeSample::new(8.0, 4.0, true),
///     TreeSample::new(9.0, 2.0, true),
/// ];
/// let tree = build_tree(&samples, &TreeParams::default());
/// assert_eq!(tree.depth(), 1);
/// assert!(tree.predict(&[7.5, 3.0]));
/// ```
#[must_use]
pub fn build_tree(samples: &[TreeSample], params: &TreeParams) -> DecisionTreeNode {
    let samples = samples.iter().collect::<Vec<_>>();
    build_node(&samples, 0, params)
}

fn build_node(samples: &[&TreeSample], depth: usize, params: &TreeParams) -> DecisionTreeNode {
    let counts = class_counts(samples.iter().copied());
    let node_gini = gini(counts);
    let make_leaf = || {
        DecisionTreeNode::Leaf(Leaf {
            value: counts[1] > counts[0],
            samples: samples.len(),
            gini: node_gini,
            class_counts: counts,
        })
    };

    let is_pure = counts[0] == 0 || counts[1] == 0;
    if depth >= params.max_depth || samples.len() < params.min_samples_split || is_pure {
        return make_leaf();
    }

    let Some(split) = best_split(samples, params.max_thresholds) else {
        return make_leaf();
    };
    if split.weighted_gini >= node_gini {
        tracing::trace!(depth, node_gini, "no improving split, forcing leaf");
        return make_leaf();
    }

    let (left, right): (Vec<&TreeSample>, Vec<&TreeSample>) = samples
        .iter()
        .copied()
        .partition(|s| s.features[split.feature_index] <= split.threshold);

    DecisionTreeNode::Internal(Internal {
        split_feature_index: split.feature_index,
        split_threshold: split.threshold,
        left: Box::new(build_node(&left, depth + 1, params)),
        right: Box::new(build_node(&right, depth + 1, params)),
        samples: samples.len(),
        gini: node_gini,
    })
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature_index: usize,
    threshold: f64,
    weighted_gini: f64,
}

#[expect(clippy::cast_precision_loss)]
fn best_split(samples: &[&TreeSample], max_thresholds: usize) -> Option<Split> {
    let total = samples.len() as f64;
    let mut best: Option<Split> = None;

    for feature_index in 0..FEATURE_COUNT {
        for threshold in candidate_thresholds(samples, feature_index, max_thresholds) {
            let (left, right): (Vec<&TreeSample>, Vec<&TreeSample>) = samples
                .iter()
                .copied()
                .partition(|s| s.features[feature_index] <= threshold);
            if left.is_empty() || right.is_empty() {
                continue;
            }
            let weighted_gini = left.len() as f64 / total * gini(class_counts(left.iter().copied()))
                + right.len() as f64 / total * gini(class_counts(right.iter().copied()));
            if best.is_none_or(|b| weighted_gini < b.weighted_gini) {
                best = Some(Split {
                    feature_index,
                    threshold,
                    weighted_gini,
                });
            }
        }
    }
    best
}

fn candidate_thresholds(
    samples: &[&TreeSample],
    feature_index: usize,
    max_thresholds: usize,
) -> Vec<f64> {
    let mut values = samples
        .iter()
        .map(|s| s.features[feature_index])
        .filter(|v| v.is_finite())
        .collect::<Vec<_>>();
    values.sort_by(f64::total_cmp);
    values.dedup();

    let midpoints = values
        .windows(2)
        .map(|w| f64::midpoint(w[0], w[1]))
        .collect::<Vec<_>>();
    if max_thresholds == 0 || midpoints.len() <= max_thresholds {
        return midpoints;
    }
    let stride = midpoints.len().div_ceil(max_thresholds);
    midpoints.into_iter().step_by(stride).collect()
}

/// Fraction of `samples` whose label the tree predicts correctly.
///
/// Returns `0.0` for an empty set.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn accuracy(tree: &DecisionTreeNode, samples: &[TreeSample]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let correct = samples
        .iter()
        .filter(|s| tree.predict(&s.features) == s.label)
        .count();
    correct as f64 / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg32;

    use super::*;

    fn noisy_samples(seed: u64, n: usize) -> Vec<TreeSample> {
        let mut rng = Pcg32::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                let x0 = rng.random_range(0.0..10.0);
                let x1 = rng.random_range(0.0..10.0);
                let label = (x0 + x1 > 10.0) ^ rng.random_bool(0.15);
                TreeSample::new(x0, x1, label)
            })
            .collect()
    }

    #[test]
    fn test_gini_values() {
        assert_eq!(gini([0, 0]), 0.0);
        assert_eq!(gini([5, 0]), 0.0);
        assert_eq!(gini([5, 5]), 0.5);
        assert!((gini([3, 1]) - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_empty_training_set() {
        let tree = build_tree(&[], &TreeParams::default());
        assert!(tree.is_leaf());
        assert_eq!(tree.samples(), 0);
    }

    #[test]
    fn test_pure_leaves_have_zero_gini() {
        let tree = build_tree(&noisy_samples(11, 120), &TreeParams::default());
        for leaf in tree.leaves() {
            if leaf.class_counts[0] == 0 || leaf.class_counts[1] == 0 {
                assert_eq!(leaf.gini, 0.0);
            }
        }
    }

    #[test]
    fn test_depth_never_exceeds_max_depth() {
        for max_depth in 0..6 {
            let params = TreeParams {
                max_depth,
                ..TreeParams::default()
            };
            let tree = build_tree(&noisy_samples(42, 200), &params);
            assert!(tree.depth() <= max_depth);
        }
    }

    #[test]
    fn test_leaf_samples_sum_to_total() {
        let samples = noisy_samples(9, 80);
        let tree = build_tree(&samples, &TreeParams::default());
        let total: usize = tree.leaves().iter().map(|l| l.samples).sum();
        assert_eq!(total, samples.len());
    }

    #[test]
    fn test_non_separable_data_forces_leaf() {
        // Identical features with conflicting labels cannot be split.
        let samples = [
            TreeSample::new(1.0, 1.0, true),
            TreeSample::new(1.0, 1.0, false),
            TreeSample::new(1.0, 1.0, true),
        ];
        let tree = build_tree(&samples, &TreeParams::default());
        assert!(tree.is_leaf());
        assert!(tree.predict(&[1.0, 1.0]));
    }

    #[test]
    fn test_min_samples_split() {
        let samples = noisy_samples(4, 10);
        let params = TreeParams {
            min_samples_split: 11,
            ..TreeParams::default()
        };
        assert!(build_tree(&samples, &params).is_leaf());
    }

    #[test]
    fn test_tie_break_prefers_first_feature() {
        // Both features separate the classes perfectly at the same position.
        let samples = [
            TreeSample::new(0.0, 0.0, false),
            TreeSample::new(1.0, 1.0, true),
        ];
        let DecisionTreeNode::Internal(root) = build_tree(&samples, &TreeParams::default()) else {
            panic!("expected a split");
        };
        assert_eq!(root.split_feature_index, 0);
        assert_eq!(root.split_threshold, 0.5);
    }

    #[test]
    fn test_build_is_deterministic() {
        let samples = noisy_samples(21, 150);
        let params = TreeParams::default();
        assert_eq!(build_tree(&samples, &params), build_tree(&samples, &params));
    }

    #[test]
    fn test_threshold_subsampling_bounds_candidates() {
        let samples = (0..500)
            .map(|i| TreeSample::new(f64::from(i), 0.0, i >= 250))
            .collect::<Vec<_>>();
        let refs = samples.iter().collect::<Vec<_>>();
        assert!(candidate_thresholds(&refs, 0, 64).len() <= 64);
        assert!(accuracy(&build_tree(&samples, &TreeParams::default()), &samples) > 0.9);
    }

    #[test]
    fn test_serialized_shape() {
        let tree = build_tree(&[TreeSample::new(0.0, 0.0, true)], &TreeParams::default());
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["kind"], "leaf");
        assert_eq!(json["value"], true);
    }
}
