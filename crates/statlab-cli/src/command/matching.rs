use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;
use statlab_models::matching::{self, MatchingParams, MatchingSummary, PSMDataPoint};
use statlab_synth::cohorts::{PsmPopulationParams, psm_population};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct MatchingArg {
    /// Number of treated units
    #[arg(long, default_value_t = 30)]
    treated: usize,
    /// Number of control units
    #[arg(long, default_value_t = 60)]
    control: usize,
    /// Upward shift of the treated group's prior scores
    #[arg(long, default_value_t = 8.0, allow_negative_numbers = true)]
    selection_bias: f64,
    /// Largest score distance accepted for a pair
    #[arg(long, default_value_t = 5.0)]
    caliper: f64,
}

#[derive(Debug, Serialize)]
struct MatchedPair {
    treated_id: u32,
    control_id: u32,
    distance: f64,
}

#[derive(Debug, Serialize)]
struct MatchingReport {
    params: MatchingParams,
    summary: MatchingSummary,
    pairs: Vec<MatchedPair>,
    points: Vec<PSMDataPoint>,
}

pub(crate) fn run(arg: &MatchingArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("matching", report)
}

fn analyze<R>(arg: &MatchingArg, rng: &mut R) -> anyhow::Result<MatchingReport>
where
    R: Rng + ?Sized,
{
    let population = psm_population(
        &PsmPopulationParams {
            treated: arg.treated,
            control: arg.control,
            selection_bias: arg.selection_bias,
            ..PsmPopulationParams::default()
        },
        rng,
    )?;
    let params = MatchingParams {
        caliper: arg.caliper,
    };
    let points = matching::match_greedy(&population, &params, rng)?;
    anyhow::ensure!(
        matching::is_symmetric(&points),
        "matching produced an asymmetric pairing"
    );

    let scores = points
        .iter()
        .map(|p| (p.id, p.prior_score))
        .collect::<HashMap<_, _>>();
    let pairs = points
        .iter()
        .filter(|p| p.group.is_treatment())
        .filter_map(|t| {
            let control_id = t.matched_with_id?;
            Some(MatchedPair {
                treated_id: t.id,
                control_id,
                distance: (t.prior_score - scores.get(&control_id)?).abs(),
            })
        })
        .collect();

    Ok(MatchingReport {
        params,
        summary: MatchingSummary::from_points(&points),
        pairs,
        points,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> MatchingArg {
        MatchingArg {
            treated: 30,
            control: 60,
            selection_bias: 8.0,
            caliper: 5.0,
        }
    }

    #[test]
    fn test_pairs_respect_caliper_and_improve_balance() {
        let report = analyze(&arg(), &mut seeded_rng(10)).unwrap();
        assert_eq!(report.pairs.len(), report.summary.pairs);
        assert!(report.summary.pairs > 0);
        assert!(report.pairs.iter().all(|p| p.distance <= 5.0));
        assert!(
            report.summary.balance_after.difference.abs()
                < report.summary.balance_before.difference.abs()
        );
    }

    #[test]
    fn test_zero_caliper_matches_nothing() {
        let arg = MatchingArg {
            caliper: 0.0,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(10)).unwrap();
        assert!(report.pairs.is_empty());
        assert_eq!(report.summary.unmatched_treated, 30);
    }

    #[test]
    fn test_negative_caliper_is_rejected() {
        let arg = MatchingArg {
            caliper: -1.0,
            ..arg()
        };
        assert!(analyze(&arg, &mut seeded_rng(10)).is_err());
    }
}
