use rand::Rng;
use serde::Serialize;
use statlab_models::decision_tree::{self, DecisionTreeNode, TreeParams};
use statlab_synth::points::{TreeDataParams, tree_samples};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TreeArg {
    /// Number of training samples
    #[arg(long, default_value_t = 100)]
    n: usize,
    /// Number of held-out samples scored after training
    #[arg(long, default_value_t = 100)]
    test_n: usize,
    /// Probability of flipping each generated label
    #[arg(long, default_value_t = 0.1)]
    label_noise: f64,
    /// Maximum tree depth
    #[arg(long, default_value_t = 3)]
    max_depth: usize,
    /// Nodes with fewer samples become leaves
    #[arg(long, default_value_t = 2)]
    min_samples_split: usize,
}

#[derive(Debug, Serialize)]
struct TreeReport {
    params: TreeParams,
    depth: usize,
    leaf_count: usize,
    training_accuracy: f64,
    test_accuracy: f64,
    tree: DecisionTreeNode,
}

pub(crate) fn run(arg: &TreeArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("tree", report)
}

fn analyze<R>(arg: &TreeArg, rng: &mut R) -> anyhow::Result<TreeReport>
where
    R: Rng + ?Sized,
{
    let data = |n| TreeDataParams {
        n,
        label_noise: arg.label_noise,
    };
    let training = tree_samples(&data(arg.n), rng)?;
    let test = tree_samples(&data(arg.test_n), rng)?;

    let params = TreeParams {
        max_depth: arg.max_depth,
        min_samples_split: arg.min_samples_split,
        ..TreeParams::default()
    };
    let tree = decision_tree::build_tree(&training, &params);
    tracing::debug!(depth = tree.depth(), leaves = tree.leaf_count(), "tree built");

    Ok(TreeReport {
        params,
        depth: tree.depth(),
        leaf_count: tree.leaf_count(),
        training_accuracy: decision_tree::accuracy(&tree, &training),
        test_accuracy: decision_tree::accuracy(&tree, &test),
        tree,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> TreeArg {
        TreeArg {
            n: 300,
            test_n: 300,
            label_noise: 0.0,
            max_depth: 3,
            min_samples_split: 2,
        }
    }

    #[test]
    fn test_clean_rule_generalizes() {
        let report = analyze(&arg(), &mut seeded_rng(2)).unwrap();
        assert!(report.depth <= 3);
        assert!(report.training_accuracy > 0.95);
        assert!(report.test_accuracy > 0.9);
        assert_eq!(report.tree.samples(), 300);
    }

    #[test]
    fn test_depth_zero_is_a_single_leaf() {
        let arg = TreeArg {
            max_depth: 0,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(2)).unwrap();
        assert_eq!(report.depth, 0);
        assert_eq!(report.leaf_count, 1);
        assert!(report.tree.is_leaf());
    }
}
