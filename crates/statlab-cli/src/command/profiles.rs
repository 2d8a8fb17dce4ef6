use rand::Rng;
use serde::Serialize;
use statlab_models::profile::{self, Profile};
use statlab_synth::points::profile_mixture;

use crate::report::RunContext;

/// Centers of the generated profiles, used in order.
const PROFILE_MEANS: [[f64; 2]; 4] = [[30.0, 40.0], [70.0, 75.0], [50.0, 15.0], [85.0, 30.0]];
const PROFILE_COVARIANCE: [[f64; 2]; 2] = [[36.0, 12.0], [12.0, 36.0]];

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ProfilesArg {
    /// Number of profiles in the generated data (at most 4)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=4))]
    profiles: u8,
    /// Number of observations
    #[arg(long, default_value_t = 300)]
    n: usize,
    /// Fit models with 1 up to this many profiles
    #[arg(long, default_value_t = 4)]
    max_profiles: usize,
    /// EM iterations per model
    #[arg(long, default_value_t = 100)]
    max_iterations: usize,
    /// Stop once the log-likelihood improves by less than this
    #[arg(long, default_value_t = 1e-6)]
    tolerance: f64,
}

#[derive(Debug, Serialize)]
struct FittedModel {
    profile_count: usize,
    iterations: usize,
    log_likelihood: f64,
    bic: f64,
    profiles: Vec<Profile>,
}

#[derive(Debug, Serialize)]
struct ProfilesReport {
    true_profiles: Vec<Profile>,
    candidates: Vec<FittedModel>,
    /// Profile count with the lowest BIC.
    best_profile_count: usize,
    /// Observations assigned to each profile of the best model.
    class_sizes: Vec<usize>,
}

pub(crate) fn run(arg: &ProfilesArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("profiles", report)
}

fn true_profiles(count: usize) -> Vec<Profile> {
    #[expect(clippy::cast_precision_loss)]
    let weight = 1.0 / count as f64;
    PROFILE_MEANS
        .iter()
        .take(count)
        .enumerate()
        .map(|(id, &mean)| Profile {
            id,
            mean,
            covariance: PROFILE_COVARIANCE,
            weight,
        })
        .collect()
}

fn analyze<R>(arg: &ProfilesArg, rng: &mut R) -> anyhow::Result<ProfilesReport>
where
    R: Rng + ?Sized,
{
    let true_profiles = true_profiles(usize::from(arg.profiles));
    let data = profile_mixture(&true_profiles, arg.n, rng)?
        .into_iter()
        .map(|s| s.values)
        .collect::<Vec<_>>();

    let candidates = (1..=arg.max_profiles)
        .map(|k| fit(&data, k, arg, rng))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let best = candidates
        .iter()
        .min_by(|a, b| a.bic.total_cmp(&b.bic))
        .ok_or_else(|| anyhow::anyhow!("--max-profiles must be at least 1"))?;

    let mut class_sizes = vec![0; best.profile_count];
    for class in profile::assign_profiles(&data, &best.profiles) {
        class_sizes[class] += 1;
    }

    Ok(ProfilesReport {
        best_profile_count: best.profile_count,
        class_sizes,
        true_profiles,
        candidates,
    })
}

fn fit<R>(data: &[[f64; 2]], k: usize, arg: &ProfilesArg, rng: &mut R) -> anyhow::Result<FittedModel>
where
    R: Rng + ?Sized,
{
    let mut profiles = profile::initial_profiles(data, k, rng)?;
    let mut log_likelihood = profile::log_likelihood(data, &profiles);
    let mut iterations = 0;
    while iterations < arg.max_iterations {
        let step = profile::em_step(data, &profiles)?;
        iterations += 1;
        let improvement = step.log_likelihood - log_likelihood;
        profiles = step.profiles;
        log_likelihood = step.log_likelihood;
        if improvement.abs() < arg.tolerance {
            break;
        }
    }
    tracing::debug!(k, iterations, log_likelihood, "profile model fitted");

    Ok(FittedModel {
        profile_count: k,
        iterations,
        log_likelihood,
        bic: profile::bic(log_likelihood, k, data.len()),
        profiles,
    })
}
