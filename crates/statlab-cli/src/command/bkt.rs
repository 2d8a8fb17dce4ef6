use rand::Rng;
use serde::Serialize;
use statlab_models::bkt::{self, BktParams};
use statlab_synth::learning::{SimulatedResponse, simulate_responses};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct BktArg {
    /// Probability of learning the skill after each opportunity
    #[arg(long, default_value_t = 0.1)]
    learn: f64,
    /// Probability of a correct answer without the skill
    #[arg(long, default_value_t = 0.2)]
    guess: f64,
    /// Probability of a wrong answer despite the skill
    #[arg(long, default_value_t = 0.1)]
    slip: f64,
    /// Prior probability that the skill is already known
    #[arg(long, default_value_t = 0.1)]
    initial_mastery: f64,
    /// Number of practice opportunities to simulate
    #[arg(long, default_value_t = 20)]
    opportunities: usize,
}

#[derive(Debug, Serialize)]
struct Opportunity {
    /// Probability of a correct answer before responding.
    predicted_correct: f64,
    #[serde(flatten)]
    response: SimulatedResponse,
}

#[derive(Debug, Serialize)]
struct BktReport {
    params: BktParams,
    initial_mastery: f64,
    final_mastery: f64,
    /// 1-based opportunity at which the estimate first crossed the mastery threshold.
    mastered_at: Option<usize>,
    accuracy: f64,
    opportunities: Vec<Opportunity>,
}

pub(crate) fn run(arg: &BktArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("bkt", report)
}

#[expect(clippy::cast_precision_loss)]
fn analyze<R>(arg: &BktArg, rng: &mut R) -> anyhow::Result<BktReport>
where
    R: Rng + ?Sized,
{
    let params = BktParams::new(arg.learn, arg.guess, arg.slip)?;
    let responses = simulate_responses(&params, arg.initial_mastery, arg.opportunities, rng)?;

    let outcomes = responses.iter().map(|r| r.correct).collect::<Vec<_>>();
    let trace = bkt::trace_mastery(arg.initial_mastery, &outcomes, &params);
    let opportunities = trace
        .iter()
        .zip(responses)
        .map(|(&prior, response)| Opportunity {
            predicted_correct: bkt::predict_correct(prior, &params),
            response,
        })
        .collect::<Vec<_>>();

    let final_mastery = trace.last().copied().unwrap_or(arg.initial_mastery);
    let mastered_at = trace.iter().skip(1).position(|&m| bkt::is_mastered(m)).map(|i| i + 1);
    let accuracy = if outcomes.is_empty() {
        0.0
    } else {
        outcomes.iter().filter(|&&c| c).count() as f64 / outcomes.len() as f64
    };
    tracing::debug!(final_mastery, ?mastered_at, "mastery traced");

    Ok(BktReport {
        params,
        initial_mastery: arg.initial_mastery,
        final_mastery,
        mastered_at,
        accuracy,
        opportunities,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> BktArg {
        BktArg {
            learn: 0.3,
            guess: 0.2,
            slip: 0.1,
            initial_mastery: 0.1,
            opportunities: 30,
        }
    }

    #[test]
    fn test_trace_matches_simulated_estimates() {
        let report = analyze(&arg(), &mut seeded_rng(4)).unwrap();
        assert_eq!(report.opportunities.len(), 30);
        let last = report.opportunities.last().unwrap();
        assert!((last.response.mastery - report.final_mastery).abs() < 1e-12);
        assert!(
            report
                .opportunities
                .iter()
                .all(|o| (0.0..=1.0).contains(&o.predicted_correct))
        );
        if let Some(at) = report.mastered_at {
            assert!(bkt::is_mastered(report.opportunities[at - 1].response.mastery));
        }
    }

    #[test]
    fn test_no_opportunities() {
        let arg = BktArg {
            opportunities: 0,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(4)).unwrap();
        assert_eq!(report.final_mastery, 0.1);
        assert_eq!(report.mastered_at, None);
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn test_invalid_params_are_rejected() {
        let arg = BktArg { slip: 1.2, ..arg() };
        assert!(analyze(&arg, &mut seeded_rng(4)).is_err());
    }
}
