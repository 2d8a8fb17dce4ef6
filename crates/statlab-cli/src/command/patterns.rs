use rand::Rng;
use serde::Serialize;
use statlab_models::sequence::{self, FrequentPattern, MiningParams, TransitionStat};
use statlab_synth::learning::{ActionSequenceParams, action_sequences};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PatternsArg {
    /// Number of learner action logs
    #[arg(long, default_value_t = 40)]
    sequences: usize,
    /// Actions per log
    #[arg(long, default_value_t = 12)]
    length: usize,
    /// Probability that an action is followed by its canonical successor
    #[arg(long, default_value_t = 0.6)]
    follow_probability: f64,
    /// Minimum fraction of logs containing a pattern
    #[arg(long, default_value_t = 0.3)]
    min_support: f64,
    /// Longest pattern to mine
    #[arg(long, default_value_t = 4)]
    max_length: usize,
    /// Distance between the actions of a transition
    #[arg(long, default_value_t = 1)]
    lag: usize,
    /// Report every transition instead of only the significant ones
    #[arg(long)]
    all_transitions: bool,
}

#[derive(Debug, Serialize)]
struct PatternsReport {
    params: MiningParams,
    lag: usize,
    patterns: Vec<FrequentPattern>,
    transitions: Vec<TransitionStat>,
}

pub(crate) fn run(arg: &PatternsArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("patterns", report)
}

fn analyze<R>(arg: &PatternsArg, rng: &mut R) -> anyhow::Result<PatternsReport>
where
    R: Rng + ?Sized,
{
    let sequences = action_sequences(
        &ActionSequenceParams {
            sequences: arg.sequences,
            length: arg.length,
            follow_probability: arg.follow_probability,
            ..ActionSequenceParams::default()
        },
        rng,
    )?;

    let params = MiningParams {
        min_support: arg.min_support,
        max_length: arg.max_length,
    };
    let patterns = sequence::mine_patterns(&sequences, &params)?;
    let mut transitions = sequence::lag_sequential_analysis(&sequences, arg.lag)?;
    if !arg.all_transitions {
        transitions.retain(|t| t.significant);
    }
    tracing::debug!(
        patterns = patterns.len(),
        transitions = transitions.len(),
        "sequences analysed"
    );

    Ok(PatternsReport {
        params,
        lag: arg.lag,
        patterns,
        transitions,
    })
}
