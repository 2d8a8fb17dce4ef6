use rand::Rng;
use serde::Serialize;
use statlab_models::kmeans::{KMeansPoint, KMeansSession};
use statlab_synth::points::{ClusterParams, cluster_points};

use crate::report::RunContext;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct KMeansArg {
    /// Number of centroids
    #[arg(long, short, default_value_t = 3)]
    k: usize,
    /// Number of generated blobs
    #[arg(long, default_value_t = 3)]
    clusters: usize,
    /// Points generated per blob
    #[arg(long, default_value_t = 20)]
    points_per_cluster: usize,
    /// Standard deviation of each blob
    #[arg(long, default_value_t = 5.0)]
    spread: f64,
    /// Stop after this many steps even if not converged
    #[arg(long, default_value_t = 200)]
    max_steps: usize,
}

#[derive(Debug, Serialize)]
struct Iteration {
    iteration: usize,
    inertia: f64,
}

#[derive(Debug, Serialize)]
struct KMeansReport {
    converged: bool,
    steps: usize,
    inertia: f64,
    history: Vec<Iteration>,
    session: KMeansSession,
}

pub(crate) fn run(arg: &KMeansArg, mut ctx: RunContext) -> anyhow::Result<()> {
    let report = analyze(arg, ctx.rng())?;
    ctx.emit("kmeans", report)
}

fn analyze<R>(arg: &KMeansArg, rng: &mut R) -> anyhow::Result<KMeansReport>
where
    R: Rng + ?Sized,
{
    let params = ClusterParams {
        clusters: arg.clusters,
        points_per_cluster: arg.points_per_cluster,
        spread: arg.spread,
        ..ClusterParams::default()
    };
    let points = cluster_points(&params, rng)?
        .into_iter()
        .map(KMeansPoint::from)
        .collect();

    let mut session = KMeansSession::new(points, arg.k)?.initialize_random(rng);
    let mut history = vec![];
    let mut steps = 0;
    while steps < arg.max_steps && (session.phase.is_assign() || session.phase.is_update()) {
        let before = session.iterations;
        session = session.step(rng);
        steps += 1;
        if session.iterations > before {
            history.push(Iteration {
                iteration: session.iterations,
                inertia: session.inertia(),
            });
        }
    }

    let converged = session.phase.is_converged();
    if !converged {
        tracing::warn!(steps, "k-means stopped before converging");
    }
    Ok(KMeansReport {
        converged,
        steps,
        inertia: session.inertia(),
        history,
        session,
    })
}

#[cfg(test)]
mod tests {
    use statlab_synth::seeded_rng;

    use super::*;

    fn arg() -> KMeansArg {
        KMeansArg {
            k: 3,
            clusters: 3,
            points_per_cluster: 20,
            spread: 2.0,
            max_steps: 200,
        }
    }

    #[test]
    fn test_session_runs_to_convergence() {
        let report = analyze(&arg(), &mut seeded_rng(8)).unwrap();
        assert!(report.converged);
        assert_eq!(report.session.centroids.len(), 3);
        assert!(report.session.points.iter().all(|p| p.cluster_id.is_some()));
        assert_eq!(report.history.len(), report.session.iterations);
    }

    #[test]
    fn test_step_limit_is_respected() {
        let arg = KMeansArg {
            max_steps: 1,
            ..arg()
        };
        let report = analyze(&arg, &mut seeded_rng(8)).unwrap();
        assert_eq!(report.steps, 1);
        assert!(report.history.is_empty());
        assert!(!report.converged);
    }

    #[test]
    fn test_zero_clusters_is_rejected() {
        let arg = KMeansArg { k: 0, ..arg() };
        assert!(analyze(&arg, &mut seeded_rng(8)).is_err());
    }
}
