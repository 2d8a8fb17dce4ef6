use std::collections::BTreeMap;

use rand::Rng;
use serde::Serialize;
use statlab_stats::survival::{self, LogRankResult, SurvivalCurvePoint};
use statlab_synth::cohorts::{GroupHazard, SurvivalParams, survival_records};

use crate::report::RunContext;

const CONTROL: &str = "control";
const INTERVENTION: &str = "intervention";

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct SurvivalArg {
    /// Subjects per group
    #[arg(long, default_value_t = 50)]
    per_group: usize,
    /// Event rate of the control group
    #[arg(long, default_value_t = 0.15)]
    control_hazard: f64,
    /// Event rate of the intervention group
    #[arg(long, default_value_t = 0.08)]
    intervention_hazard: f64,
    /// Rate of random drop-out (0 disables drop-out)
    #[arg(long, default_value_t = 0.03)]
    censoring_rate: f64,
    /// End of follow-up
    #[arg(long, default_value_t = 24.0)]
    max_time: f64,
}

#[derive(Debug, Serialize)]
struct GroupCurve {
    subjects: usize,
    events: usize,
    median_survival: Option<f64>,
    curve: Vec<SurvivalCurvePoint>,
}

#[derive(Debug, Serialize)]
struct SurvivalReport {
    groups: BTreeMap<String, GroupCurve>,
    log_rank: LogRankResult,
}

pub(crate) fn run(arg: &SurvivalArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("survival", report)
}

fn analyze<R>(arg: &SurvivalArg, rng: &mut R) -> anyhow::Result<SurvivalReport>
where
    R: Rng + ?Sized,
{
    let params = SurvivalParams {
        per_group: arg.per_group,
        groups: vec![
            GroupHazard {
                name: CONTROL.to_owned(),
                hazard_rate: arg.control_hazard,
            },
            GroupHazard {
                name: INTERVENTION.to_owned(),
                hazard_rate: arg.intervention_hazard,
            },
        ],
        censoring_rate: arg.censoring_rate,
        max_time: arg.max_time,
    };
    let records = survival_records(&params, rng)?;

    let groups = survival::curves_by_group(&records)
        .into_iter()
        .map(|(name, curve)| {
            let group = GroupCurve {
                subjects: records.iter().filter(|r| r.group == name).count(),
                events: curve.events.iter().sum(),
                median_survival: curve.median_survival(),
                curve: curve.points(),
            };
            (name, group)
        })
        .collect();
    let log_rank = survival::log_rank_test(&records, CONTROL, INTERVENTION);

    Ok(SurvivalReport { groups, log_rank })
}
