use rand::Rng;
use serde::Serialize;
use statlab_models::attribution::{Explanation, LinearModel};
use statlab_synth::points::{LinearDataParams, linear_samples};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct AttributionArg {
    /// Number of training rows
    #[arg(long, default_value_t = 200)]
    n: usize,
    /// Generating coefficients, one per feature
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [2.0, -1.0, 0.5],
        allow_negative_numbers = true
    )]
    coefficients: Vec<f64>,
    /// Standard deviation of the outcome noise
    #[arg(long, default_value_t = 1.0)]
    noise: f64,
    /// Number of leading rows to explain individually
    #[arg(long, default_value_t = 3)]
    explain: usize,
}

#[derive(Debug, Serialize)]
struct RowExplanation {
    row: usize,
    features: Vec<f64>,
    target: f64,
    #[serde(flatten)]
    explanation: Explanation,
}

#[derive(Debug, Serialize)]
struct AttributionReport {
    true_coefficients: Vec<f64>,
    model: LinearModel,
    /// Mean absolute contribution of each feature over the training rows.
    global_importance: Vec<f64>,
    explanations: Vec<RowExplanation>,
}

pub(crate) fn run(arg: &AttributionArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("attribution", report)
}

fn analyze<R>(arg: &AttributionArg, rng: &mut R) -> anyhow::Result<AttributionReport>
where
    R: Rng + ?Sized,
{
    let params = LinearDataParams {
        n: arg.n,
        coefficients: arg.coefficients.clone(),
        noise_std_dev: arg.noise,
        ..LinearDataParams::default()
    };
    let (rows, targets) = linear_samples(&params, rng)?;

    let model = LinearModel::fit(&rows, &targets)?;
    let global_importance = model.global_importance(&rows)?;
    let explanations = rows
        .iter()
        .zip(&targets)
        .take(arg.explain)
        .enumerate()
        .map(|(row, (features, &target))| -> anyhow::Result<RowExplanation> {
            Ok(RowExplanation {
                row,
                features: features.clone(),
                target,
                explanation: model.explain(features)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(AttributionReport {
        true_coefficients: params.coefficients,
        model,
        global_importance,
        explanations,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> AttributionArg {
        AttributionArg {
            n: 200,
            coefficients: vec![2.0, -1.0, 0.5],
            noise: 1.0,
            explain: 3,
        }
    }

    #[test]
    fn test_explanations_add_up() {
        let report = analyze(&arg(), &mut seeded_rng(20)).unwrap();
        assert_eq!(report.explanations.len(), 3);
        for row in &report.explanations {
            let e = &row.explanation;
            let total = e.base_value + e.contributions.iter().sum::<f64>();
            assert!((total - e.prediction).abs() < 1e-9);
        }
    }

    #[test]
    fn test_importance_follows_coefficient_size() {
        let report = analyze(&arg(), &mut seeded_rng(20)).unwrap();
        let importance = &report.global_importance;
        assert!(importance[0] > importance[1]);
        assert!(importance[1] > importance[2]);
    }

    #[test]
    fn test_no_features_is_rejected() {
        let arg = AttributionArg {
            coefficients: vec![],
            ..arg()
        };
        assert!(analyze(&arg, &mut seeded_rng(20)).is_err());
    }
}
