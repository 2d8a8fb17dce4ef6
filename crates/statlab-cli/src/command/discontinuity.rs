use rand::Rng;
use serde::Serialize;
use statlab_models::discontinuity::{self, RddEstimate, RddParams};
use statlab_synth::points::{RddDataParams, rdd_points};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct DiscontinuityArg {
    /// Number of generated units
    #[arg(long, default_value_t = 200)]
    n: usize,
    /// Running-variable cutoff
    #[arg(long, default_value_t = 50.0, allow_negative_numbers = true)]
    cutoff: f64,
    /// Half-width of the estimation window
    #[arg(long, default_value_t = 20.0)]
    bandwidth: f64,
    /// True jump in the generated outcome at the cutoff
    #[arg(long, default_value_t = 10.0, allow_negative_numbers = true)]
    effect: f64,
    /// Standard deviation of the outcome noise
    #[arg(long, default_value_t = 5.0)]
    noise: f64,
    /// Treat units below the cutoff instead of above
    #[arg(long)]
    treatment_below: bool,
}

#[derive(Debug, Serialize)]
struct DiscontinuityReport {
    params: RddParams,
    true_effect: f64,
    estimate: RddEstimate,
    /// Estimated minus true effect.
    bias: f64,
}

pub(crate) fn run(arg: &DiscontinuityArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("discontinuity", report)
}

fn analyze<R>(arg: &DiscontinuityArg, rng: &mut R) -> anyhow::Result<DiscontinuityReport>
where
    R: Rng + ?Sized,
{
    let treatment_above = !arg.treatment_below;
    let data = RddDataParams {
        n: arg.n,
        cutoff: arg.cutoff,
        effect: arg.effect,
        noise_std_dev: arg.noise,
        treatment_above,
        ..RddDataParams::default()
    };
    let points = rdd_points(&data, rng)?;

    let params = RddParams {
        cutoff: arg.cutoff,
        bandwidth: arg.bandwidth,
        treatment_above,
    };
    let estimate = discontinuity::estimate_effect(&points, &params)?;
    Ok(DiscontinuityReport {
        params,
        true_effect: arg.effect,
        bias: estimate.effect - arg.effect,
        estimate,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> DiscontinuityArg {
        DiscontinuityArg {
            n: 400,
            cutoff: 50.0,
            bandwidth: 20.0,
            effect: 10.0,
            noise: 2.0,
            treatment_below: false,
        }
    }

    #[test]
    fn test_effect_is_recovered() {
        let report = analyze(&arg(), &mut seeded_rng(12)).unwrap();
        assert!(!report.estimate.low_confidence);
        assert!(report.bias.abs() < 2.0);
        assert!(report.estimate.treated_count + report.estimate.control_count <= 400);
    }

    #[test]
    fn test_treatment_below_flips_sign_convention() {
        let arg = DiscontinuityArg {
            treatment_below: true,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(12)).unwrap();
        assert!(!report.params.treatment_above);
        assert!(report.bias.abs() < 2.0);
    }

    #[test]
    fn test_tiny_bandwidth_is_low_confidence() {
        let arg = DiscontinuityArg {
            bandwidth: 0.0,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(12)).unwrap();
        assert!(report.estimate.low_confidence);
    }
}
