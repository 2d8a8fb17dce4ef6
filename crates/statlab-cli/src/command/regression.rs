use std::path::PathBuf;

use rand::Rng;
use serde::Serialize;
use statlab_stats::regression::{self, Point, RegressionSummary};
use statlab_synth::points::{CorrelatedParams, correlated_points};

use crate::{report::RunContext, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct RegressionArg {
    /// Number of points to generate
    #[arg(long, default_value_t = 50)]
    n: usize,
    /// Target correlation of the generated points
    #[arg(long, default_value_t = 0.7, allow_negative_numbers = true)]
    correlation: f64,
    /// Analyse points from a JSON file instead of generating them
    #[arg(long)]
    points: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RegressionReport {
    summary: RegressionSummary,
    residuals: Vec<f64>,
    points: Vec<Point>,
}

pub(crate) fn run(arg: &RegressionArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let points = match &arg.points {
        Some(path) => util::read_points_file(path)?,
        None => generate(arg, ctx.rng())?,
    };
    ctx.emit("regression", analyze(points))
}

fn generate<R>(arg: &RegressionArg, rng: &mut R) -> anyhow::Result<Vec<Point>>
where
    R: Rng + ?Sized,
{
    let params = CorrelatedParams {
        n: arg.n,
        correlation: arg.correlation,
        ..CorrelatedParams::default()
    };
    Ok(correlated_points(&params, rng)?)
}

fn analyze(points: Vec<Point>) -> RegressionReport {
    let summary = RegressionSummary::from_points(&points);
    if summary.degenerate {
        tracing::warn!(count = summary.count, "regression line is degenerate");
    }
    let residuals = regression::residuals(&points, &summary.line);
    RegressionReport {
        summary,
        residuals,
        points,
    }
}
