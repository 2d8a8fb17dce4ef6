use rand::Rng;
use serde::Serialize;
use statlab_models::factor::{self, FactorAnalysis};
use statlab_synth::learning::{SurveyParams, survey_responses};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct FactorsArg {
    /// Number of survey respondents
    #[arg(long, default_value_t = 200)]
    respondents: usize,
    /// Latent factors behind the generated items
    #[arg(long, default_value_t = 2)]
    factors: usize,
    /// Items written for each factor
    #[arg(long, default_value_t = 4)]
    items_per_factor: usize,
    /// Standardized loading of every item on its factor
    #[arg(long, default_value_t = 0.8)]
    loading: f64,
    /// Response categories per item
    #[arg(long, default_value_t = 5)]
    scale_points: u8,
    /// Factors to extract (Kaiser criterion when omitted)
    #[arg(long)]
    extract: Option<usize>,
    /// Principal components to retain
    #[arg(long, default_value_t = 2)]
    components: usize,
    /// Include per-respondent component scores
    #[arg(long)]
    scores: bool,
}

#[derive(Debug, Serialize)]
struct PcaSummary {
    eigenvalues: Vec<f64>,
    explained_variance_ratio: Vec<f64>,
    components: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scores: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Serialize)]
struct Reliability {
    /// Cronbach's alpha of each generated item block.
    per_factor: Vec<f64>,
    /// Cronbach's alpha of all items together.
    overall: f64,
}

#[derive(Debug, Serialize)]
struct FactorsReport {
    items: usize,
    factor_analysis: FactorAnalysis,
    pca: PcaSummary,
    reliability: Reliability,
}

pub(crate) fn run(arg: &FactorsArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("factors", report)
}

fn analyze<R>(arg: &FactorsArg, rng: &mut R) -> anyhow::Result<FactorsReport>
where
    R: Rng + ?Sized,
{
    let rows = survey_responses(
        &SurveyParams {
            respondents: arg.respondents,
            factors: arg.factors,
            items_per_factor: arg.items_per_factor,
            loading: arg.loading,
            scale_points: arg.scale_points,
        },
        rng,
    )?;

    let factor_analysis = factor::factor_analysis(&rows, arg.extract)?;
    let pca = factor::pca(&rows, arg.components)?;

    let per_factor = if arg.items_per_factor < 2 {
        vec![]
    } else {
        (0..arg.factors)
            .map(|f| {
                let items = f * arg.items_per_factor..(f + 1) * arg.items_per_factor;
                let block = rows.iter().map(|row| &row[items.clone()]).collect::<Vec<_>>();
                factor::cronbach_alpha(&block)
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    let reliability = Reliability {
        per_factor,
        overall: factor::cronbach_alpha(&rows)?,
    };

    Ok(FactorsReport {
        items: arg.factors * arg.items_per_factor,
        factor_analysis,
        pca: PcaSummary {
            eigenvalues: pca.eigenvalues,
            explained_variance_ratio: pca.explained_variance_ratio,
            components: pca.components,
            scores: arg.scores.then_some(pca.scores),
        },
        reliability,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> FactorsArg {
        FactorsArg {
            respondents: 300,
            factors: 2,
            items_per_factor: 4,
            loading: 0.8,
            scale_points: 5,
            extract: None,
            components: 2,
            scores: false,
        }
    }

    #[test]
    fn test_two_factor_structure_is_found() {
        let report = analyze(&arg(), &mut seeded_rng(18)).unwrap();
        assert_eq!(report.items, 8);
        assert_eq!(report.factor_analysis.factor_count, 2);
        assert_eq!(report.reliability.per_factor.len(), 2);
        assert!(report.reliability.per_factor.iter().all(|&alpha| alpha > 0.7));
        assert!(report.pca.scores.is_none());
        let ratio = report.pca.explained_variance_ratio.iter().sum::<f64>();
        assert!((ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scores_are_optional() {
        let arg = FactorsArg {
            scores: true,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(18)).unwrap();
        let scores = report.pca.scores.unwrap();
        assert_eq!(scores.len(), 300);
        assert!(scores.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_too_many_components_is_rejected() {
        let arg = FactorsArg {
            components: 9,
            ..arg()
        };
        assert!(analyze(&arg, &mut seeded_rng(18)).is_err());
    }
}
