//! Two-dimensional datasets.

use rand::{Rng, distr::Distribution as _, distr::weighted::WeightedIndex};
use serde::{Deserialize, Serialize};
use statlab_models::{decision_tree::TreeSample, profile::Profile};
use statlab_stats::regression::Point;

use crate::{
    SynthError,
    normal::{standard_normal, standard_normal_pair},
};

/// Shape of a correlated `(x, y)` cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedParams {
    pub n: usize,
    /// Target Pearson correlation, in `[-1, 1]`.
    pub correlation: f64,
    pub x_mean: f64,
    pub x_std_dev: f64,
    pub y_mean: f64,
    pub y_std_dev: f64,
}

impl Default for CorrelatedParams {
    fn default() -> Self {
        Self {
            n: 50,
            correlation: 0.7,
            x_mean: 50.0,
            x_std_dev: 10.0,
            y_mean: 50.0,
            y_std_dev: 10.0,
        }
    }
}

/// Draws points whose correlation equals `correlation` in expectation.
///
/// With standard normals `x` and `z`, `y = r·x + √(1 - r²)·z` has unit
/// variance and correlation `r` with `x`; both are then rescaled.
pub fn correlated_points<R>(params: &CorrelatedParams, rng: &mut R) -> Result<Vec<Point>, SynthError>
where
    R: Rng + ?Sized,
{
    let r = params.correlation;
    if !(-1.0..=1.0).contains(&r) {
        return Err(SynthError::InvalidCorrelation { value: r });
    }
    SynthError::check_std_dev("x_std_dev", params.x_std_dev)?;
    SynthError::check_std_dev("y_std_dev", params.y_std_dev)?;

    let residual = (1.0 - r * r).sqrt();
    let points = (0..params.n)
        .map(|i| {
            let (x, z) = standard_normal_pair(rng);
            let y = r * x + residual * z;
            Point::new(
                point_id(i),
                params.x_mean + params.x_std_dev * x,
                params.y_mean + params.y_std_dev * y,
            )
        })
        .collect();
    Ok(points)
}

/// Shape of a blob dataset for clustering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterParams {
    pub clusters: usize,
    pub points_per_cluster: usize,
    /// Standard deviation of each blob around its center.
    pub spread: f64,
    /// Centers are drawn uniformly from `[0, extent]²`.
    pub extent: f64,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            clusters: 3,
            points_per_cluster: 20,
            spread: 5.0,
            extent: 100.0,
        }
    }
}

/// Draws Gaussian blobs around uniformly placed centers.
pub fn cluster_points<R>(params: &ClusterParams, rng: &mut R) -> Result<Vec<Point>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_std_dev("spread", params.spread)?;
    SynthError::check_positive("extent", params.extent)?;

    let mut points = Vec::with_capacity(params.clusters * params.points_per_cluster);
    for _ in 0..params.clusters {
        let center_x = rng.random_range(0.0..=params.extent);
        let center_y = rng.random_range(0.0..=params.extent);
        for _ in 0..params.points_per_cluster {
            let (dx, dy) = standard_normal_pair(rng);
            points.push(Point::new(
                point_id(points.len()),
                center_x + params.spread * dx,
                center_y + params.spread * dy,
            ));
        }
    }
    tracing::debug!(points = points.len(), clusters = params.clusters, "cluster points generated");
    Ok(points)
}

/// Shape of a two-feature binary classification dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeDataParams {
    pub n: usize,
    /// Probability of flipping each label.
    pub label_noise: f64,
}

impl Default for TreeDataParams {
    fn default() -> Self {
        Self {
            n: 100,
            label_noise: 0.1,
        }
    }
}

/// Draws features uniformly from `[0, 10]²`.
///
/// The clean label is `x₀ > 4 && x₁ > 3`, a rule a depth-2 tree can represent
/// exactly; each label is then flipped with probability `label_noise`.
pub fn tree_samples<R>(params: &TreeDataParams, rng: &mut R) -> Result<Vec<TreeSample>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_probability("label_noise", params.label_noise)?;
    let samples = (0..params.n)
        .map(|_| {
            let x0 = rng.random_range(0.0..10.0);
            let x1 = rng.random_range(0.0..10.0);
            let clean = x0 > 4.0 && x1 > 3.0;
            TreeSample::new(x0, x1, clean ^ rng.random_bool(params.label_noise))
        })
        .collect();
    Ok(samples)
}

/// Shape of a sharp regression-discontinuity dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RddDataParams {
    pub n: usize,
    pub cutoff: f64,
    /// Running variable is drawn uniformly from `[x_min, x_max]`.
    pub x_min: f64,
    pub x_max: f64,
    pub intercept: f64,
    pub slope: f64,
    /// Jump added to treated outcomes.
    pub effect: f64,
    pub noise_std_dev: f64,
    pub treatment_above: bool,
}

impl Default for RddDataParams {
    fn default() -> Self {
        Self {
            n: 200,
            cutoff: 50.0,
            x_min: 0.0,
            x_max: 100.0,
            intercept: 20.0,
            slope: 0.5,
            effect: 10.0,
            noise_std_dev: 5.0,
            treatment_above: true,
        }
    }
}

pub fn rdd_points<R>(params: &RddDataParams, rng: &mut R) -> Result<Vec<Point>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_std_dev("noise_std_dev", params.noise_std_dev)?;
    SynthError::check_finite("cutoff", params.cutoff)?;
    SynthError::check_finite("intercept", params.intercept)?;
    SynthError::check_finite("slope", params.slope)?;
    SynthError::check_finite("effect", params.effect)?;
    SynthError::check_finite("x_min", params.x_min)?;
    SynthError::check_finite("x_max", params.x_max)?;
    if params.x_min >= params.x_max || !(params.x_max - params.x_min).is_finite() {
        return Err(SynthError::OutOfRange {
            name: "x_max",
            value: params.x_max,
            expected: "a finite distance above x_min",
        });
    }
    let points = (0..params.n)
        .map(|i| {
            let x = rng.random_range(params.x_min..=params.x_max);
            let treated = (x >= params.cutoff) == params.treatment_above;
            let jump = if treated { params.effect } else { 0.0 };
            let y = params.intercept
                + params.slope * x
                + jump
                + params.noise_std_dev * standard_normal(rng);
            Point::new(point_id(i), x, y)
        })
        .collect();
    Ok(points)
}

/// Shape of a multi-feature linear regression dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDataParams {
    pub n: usize,
    pub intercept: f64,
    /// One coefficient per feature.
    pub coefficients: Vec<f64>,
    pub feature_mean: f64,
    pub feature_std_dev: f64,
    pub noise_std_dev: f64,
}

impl Default for LinearDataParams {
    fn default() -> Self {
        Self {
            n: 200,
            intercept: 5.0,
            coefficients: vec![2.0, -1.0, 0.5],
            feature_mean: 10.0,
            feature_std_dev: 3.0,
            noise_std_dev: 1.0,
        }
    }
}

/// Rows of independent normal features with `y = intercept + Σ βⱼ xⱼ + e`.
pub fn linear_samples<R>(params: &LinearDataParams, rng: &mut R) -> Result<(Vec<Vec<f64>>, Vec<f64>), SynthError>
where
    R: Rng + ?Sized,
{
    if params.coefficients.is_empty() {
        return Err(SynthError::Empty { name: "coefficients" });
    }
    SynthError::check_std_dev("feature_std_dev", params.feature_std_dev)?;
    SynthError::check_std_dev("noise_std_dev", params.noise_std_dev)?;

    let rows = (0..params.n)
        .map(|_| {
            params
                .coefficients
                .iter()
                .map(|_| params.feature_mean + params.feature_std_dev * standard_normal(rng))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let targets = rows
        .iter()
        .map(|row| {
            let signal = row
                .iter()
                .zip(&params.coefficients)
                .map(|(x, beta)| x * beta)
                .sum::<f64>();
            params.intercept + signal + params.noise_std_dev * standard_normal(rng)
        })
        .collect();
    Ok((rows, targets))
}

/// One draw from a profile mixture, with the profile it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MixtureSample {
    pub profile: usize,
    pub values: [f64; 2],
}

/// Draws `n` observations from a mixture of bivariate Gaussian profiles.
///
/// Each draw picks a profile by weight, then samples it through the Cholesky
/// factor of its covariance.
pub fn profile_mixture<R>(profiles: &[Profile], n: usize, rng: &mut R) -> Result<Vec<MixtureSample>, SynthError>
where
    R: Rng + ?Sized,
{
    if profiles.is_empty() {
        return Err(SynthError::Empty { name: "profiles" });
    }
    let chooser = WeightedIndex::new(profiles.iter().map(|p| p.weight)).map_err(|_| {
        SynthError::OutOfRange {
            name: "weight",
            value: profiles.iter().map(|p| p.weight).sum(),
            expected: "non-negative weights with a positive sum",
        }
    })?;
    let factors = profiles
        .iter()
        .map(|p| cholesky(p.covariance))
        .collect::<Result<Vec<_>, _>>()?;

    let samples = (0..n)
        .map(|_| {
            let k = chooser.sample(rng);
            let [[l11, _], [l21, l22]] = factors[k];
            let (z1, z2) = standard_normal_pair(rng);
            let mean = profiles[k].mean;
            MixtureSample {
                profile: profiles[k].id,
                values: [mean[0] + l11 * z1, mean[1] + l21 * z1 + l22 * z2],
            }
        })
        .collect();
    Ok(samples)
}

/// Lower-triangular `L` with `L Lᵀ = covariance`.
fn cholesky(covariance: [[f64; 2]; 2]) -> Result<[[f64; 2]; 2], SynthError> {
    let [[var_x, cov], [_, var_y]] = covariance;
    if var_x.is_nan() || var_y.is_nan() || var_x < 0.0 || var_y < 0.0 {
        return Err(SynthError::OutOfRange {
            name: "variance",
            value: var_x.min(var_y),
            expected: "[0, ∞)",
        });
    }
    let l11 = var_x.sqrt();
    let l21 = if l11 > 0.0 { cov / l11 } else { 0.0 };
    let l22 = (var_y - l21 * l21).max(0.0).sqrt();
    Ok([[l11, 0.0], [l21, l22]])
}

/// Sequential point ids; datasets larger than `u32::MAX` are not supported.
fn point_id(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use statlab_models::{
        attribution::LinearModel,
        decision_tree::{self, TreeParams},
    };
    use statlab_stats::regression;

    use super::*;
    use crate::seeded_rng;

    #[test]
    fn test_correlation_is_realized() {
        let mut rng = seeded_rng(1);
        for target in [-0.9, 0.0, 0.5] {
            let params = CorrelatedParams {
                n: 5000,
                correlation: target,
                ..CorrelatedParams::default()
            };
            let points = correlated_points(&params, &mut rng).unwrap();
            assert!((regression::point_correlation(&points) - target).abs() < 0.06);
        }
    }

    #[test]
    fn test_perfect_correlation_is_a_line() {
        let mut rng = seeded_rng(2);
        let params = CorrelatedParams {
            correlation: 1.0,
            ..CorrelatedParams::default()
        };
        let points = correlated_points(&params, &mut rng).unwrap();
        let summary = regression::RegressionSummary::from_points(&points);
        assert!((summary.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_correlation_outside_unit_range() {
        let mut rng = seeded_rng(0);
        let params = CorrelatedParams {
            correlation: 1.5,
            ..CorrelatedParams::default()
        };
        assert_eq!(
            correlated_points(&params, &mut rng),
            Err(SynthError::InvalidCorrelation { value: 1.5 })
        );
    }

    #[test]
    fn test_ids_are_unique() {
        let mut rng = seeded_rng(3);
        let points = cluster_points(&ClusterParams::default(), &mut rng).unwrap();
        assert_eq!(points.len(), 60);
        let ids = points.iter().map(|p| p.id).collect::<HashSet<_>>();
        assert_eq!(ids.len(), points.len());
    }

    #[test]
    fn test_clean_tree_samples_are_learnable() {
        let mut rng = seeded_rng(4);
        let params = TreeDataParams {
            n: 300,
            label_noise: 0.0,
        };
        let samples = tree_samples(&params, &mut rng).unwrap();
        let tree = decision_tree::build_tree(&samples, &TreeParams::default());
        assert!(decision_tree::accuracy(&tree, &samples) > 0.95);
    }

    #[test]
    fn test_rdd_points_sides() {
        let mut rng = seeded_rng(5);
        let params = RddDataParams {
            noise_std_dev: 0.0,
            ..RddDataParams::default()
        };
        let points = rdd_points(&params, &mut rng).unwrap();
        for p in &points {
            let base = params.intercept + params.slope * p.x;
            let expected = if p.x >= params.cutoff { base + params.effect } else { base };
            assert!((p.y - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rdd_points_reject_unbounded_ranges() {
        let mut rng = seeded_rng(5);
        let cases = [
            RddDataParams {
                x_min: f64::NEG_INFINITY,
                ..RddDataParams::default()
            },
            RddDataParams {
                x_max: f64::INFINITY,
                ..RddDataParams::default()
            },
            RddDataParams {
                x_min: -f64::MAX,
                x_max: f64::MAX,
                ..RddDataParams::default()
            },
            RddDataParams {
                x_min: 10.0,
                x_max: 10.0,
                ..RddDataParams::default()
            },
            RddDataParams {
                cutoff: f64::NAN,
                ..RddDataParams::default()
            },
            RddDataParams {
                effect: f64::INFINITY,
                ..RddDataParams::default()
            },
        ];
        for params in &cases {
            assert!(matches!(
                rdd_points(params, &mut rng),
                Err(SynthError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_profile_mixture_respects_weights() {
        let profiles = [
            Profile {
                id: 0,
                mean: [0.0, 0.0],
                covariance: [[1.0, 0.5], [0.5, 1.0]],
                weight: 0.25,
            },
            Profile {
                id: 1,
                mean: [10.0, 10.0],
                covariance: [[1.0, 0.0], [0.0, 1.0]],
                weight: 0.75,
            },
        ];
        let mut rng = seeded_rng(6);
        let samples = profile_mixture(&profiles, 4000, &mut rng).unwrap();
        #[expect(clippy::cast_precision_loss)]
        let share = samples.iter().filter(|s| s.profile == 1).count() as f64 / 4000.0;
        assert!((share - 0.75).abs() < 0.03);

        let first = samples.iter().filter(|s| s.profile == 0).map(|s| s.values).collect::<Vec<_>>();
        let xs = first.iter().map(|v| v[0]).collect::<Vec<_>>();
        let ys = first.iter().map(|v| v[1]).collect::<Vec<_>>();
        assert!((regression::correlation(&xs, &ys).unwrap() - 0.5).abs() < 0.1);

        assert!(profile_mixture(&[], 10, &mut rng).is_err());
    }

    #[test]
    fn test_linear_samples_recover_coefficients() {
        let mut rng = seeded_rng(7);
        let params = LinearDataParams::default();
        let (rows, targets) = linear_samples(&params, &mut rng).unwrap();
        assert_eq!(rows.len(), params.n);
        assert!(rows.iter().all(|r| r.len() == 3));

        let model = LinearModel::fit(&rows, &targets).unwrap();
        for (fitted, truth) in model.coefficients.iter().zip(&params.coefficients) {
            assert!((fitted - truth).abs() < 0.1);
        }
        let empty = LinearDataParams {
            coefficients: vec![],
            ..LinearDataParams::default()
        };
        assert!(linear_samples(&empty, &mut rng).is_err());
    }
}
