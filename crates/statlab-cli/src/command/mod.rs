use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rand::Rng as _;
use tracing_subscriber::EnvFilter;

use crate::report::RunContext;

use self::{
    attribution::AttributionArg, bkt::BktArg, discontinuity::DiscontinuityArg,
    factors::FactorsArg, inference::InferenceArg, kmeans::KMeansArg, matching::MatchingArg,
    patterns::PatternsArg, profiles::ProfilesArg, regression::RegressionArg,
    survival::SurvivalArg, tree::TreeArg,
};

mod attribution;
mod bkt;
mod discontinuity;
mod factors;
mod inference;
mod kmeans;
mod matching;
mod patterns;
mod profiles;
mod regression;
mod survival;
mod tree;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Seed for the dataset generator (a random seed is drawn and reported when omitted)
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Output file path (defaults to stdout)
    #[arg(long, global = true)]
    output: Option<PathBuf>,
    /// Log debug-level progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Which analysis to run
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit a least-squares line to correlated points
    Regression(#[clap(flatten)] RegressionArg),
    /// Z-tests, effect size, confidence intervals, ANOVA and chi-square
    Inference(#[clap(flatten)] InferenceArg),
    /// Run K-means step by step on clustered points
    #[command(name = "kmeans")]
    KMeans(#[clap(flatten)] KMeansArg),
    /// Grow a Gini decision tree on labelled samples
    Tree(#[clap(flatten)] TreeArg),
    /// Trace Bayesian Knowledge Tracing mastery for a simulated learner
    Bkt(#[clap(flatten)] BktArg),
    /// Kaplan-Meier curves and log-rank test on time-to-event data
    Survival(#[clap(flatten)] SurvivalArg),
    /// Greedy propensity-score matching
    Matching(#[clap(flatten)] MatchingArg),
    /// Regression-discontinuity effect at a cutoff
    Discontinuity(#[clap(flatten)] DiscontinuityArg),
    /// Frequent action patterns and lag-sequential transitions
    Patterns(#[clap(flatten)] PatternsArg),
    /// Latent profiles via expectation-maximization
    Profiles(#[clap(flatten)] ProfilesArg),
    /// Factor analysis, PCA and reliability of survey items
    Factors(#[clap(flatten)] FactorsArg),
    /// Additive feature attribution for a linear model
    Attribution(#[clap(flatten)] AttributionArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    init_tracing(args.verbose);

    let seed = args.seed.unwrap_or_else(|| rand::rng().random());
    let ctx = RunContext::new(seed, args.output);
    tracing::debug!(seed, "random source seeded");

    match args.mode {
        Mode::Regression(arg) => regression::run(&arg, ctx)?,
        Mode::Inference(arg) => inference::run(&arg, ctx)?,
        Mode::KMeans(arg) => kmeans::run(&arg, ctx)?,
        Mode::Tree(arg) => tree::run(&arg, ctx)?,
        Mode::Bkt(arg) => bkt::run(&arg, ctx)?,
        Mode::Survival(arg) => survival::run(&arg, ctx)?,
        Mode::Matching(arg) => matching::run(&arg, ctx)?,
        Mode::Discontinuity(arg) => discontinuity::run(&arg, ctx)?,
        Mode::Patterns(arg) => patterns::run(&arg, ctx)?,
        Mode::Profiles(arg) => profiles::run(&arg, ctx)?,
        Mode::Factors(arg) => factors::run(&arg, ctx)?,
        Mode::Attribution(arg) => attribution::run(&arg, ctx)?,
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
