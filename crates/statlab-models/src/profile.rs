//! Latent profile analysis with Expectation-Maximization.
//!
//! Observations are bivariate and modelled as a mixture of Gaussian profiles.
//! Like K-means, EM is driven by the caller one iteration at a time:
//!
//! ```text
//! profiles₀ = initial_profiles(data, k, rng)
//! profilesₙ₊₁ = em_step(data, profilesₙ).profiles
//! ```
//!
//! Responsibilities are computed in log space and normalized with the
//! log-sum-exp trick so far-away points do not underflow to `0 / 0`. Every
//! covariance gets a small ridge on its diagonal to keep it invertible when a
//! profile collapses onto a few identical points.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Added to covariance diagonals after every M step.
pub const COVARIANCE_RIDGE: f64 = 1e-6;

/// Total responsibility below which a profile is treated as empty.
const EMPTY_PROFILE_MASS: f64 = 1e-10;

/// One latent class: a bivariate Gaussian with a mixing weight.
///
/// Weights across all profiles of a model sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: usize,
    pub mean: [f64; 2],
    pub covariance: [[f64; 2]; 2],
    pub weight: f64,
}

impl Profile {
    /// Log of the weighted density `weight · N(point | mean, covariance)`.
    fn weighted_log_density(&self, point: [f64; 2]) -> f64 {
        let [[mut var_x, cov_xy], [cov_yx, mut var_y]] = self.covariance;
        let mut det = var_x * var_y - cov_xy * cov_yx;
        if det <= 0.0 || !det.is_finite() {
            var_x += COVARIANCE_RIDGE;
            var_y += COVARIANCE_RIDGE;
            det = (var_x * var_y - cov_xy * cov_yx).max(COVARIANCE_RIDGE * COVARIANCE_RIDGE);
        }
        let dx = point[0] - self.mean[0];
        let dy = point[1] - self.mean[1];
        // (dx, dy) Σ⁻¹ (dx, dy)ᵀ
        let mahalanobis = (var_y * dx * dx - (cov_xy + cov_yx) * dx * dy + var_x * dy * dy) / det;
        self.weight.ln() - std::f64::consts::TAU.ln() - 0.5 * det.ln() - 0.5 * mahalanobis
    }
}

/// Result of one EM iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmStep {
    pub profiles: Vec<Profile>,
    /// Log-likelihood of the data under the updated profiles.
    pub log_likelihood: f64,
}

/// Picks `k` distinct observations as starting means.
///
/// Every profile starts with the pooled covariance of the data and weight `1 / k`.
#[expect(clippy::cast_precision_loss)]
pub fn initial_profiles<R>(data: &[[f64; 2]], k: usize, rng: &mut R) -> Result<Vec<Profile>, ModelError>
where
    R: Rng + ?Sized,
{
    if k == 0 {
        return Err(ModelError::InsufficientData {
            what: "profiles",
            required: 1,
            actual: 0,
        });
    }
    if data.len() < k {
        return Err(ModelError::InsufficientData {
            what: "observations",
            required: k,
            actual: data.len(),
        });
    }

    let uniform = vec![1.0; data.len()];
    let covariance = weighted_covariance(data, &uniform, weighted_mean(data, &uniform));
    let profiles = rand::seq::index::sample(rng, data.len(), k)
        .into_iter()
        .enumerate()
        .map(|(id, index)| Profile {
            id,
            mean: data[index],
            covariance,
            weight: 1.0 / k as f64,
        })
        .collect();
    Ok(profiles)
}

/// E step: the posterior probability of each profile for each observation.
///
/// Returns one row per observation; each row sums to 1.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn e_step(data: &[[f64; 2]], profiles: &[Profile]) -> Vec<Vec<f64>> {
    data.iter()
        .map(|&point| {
            let logs = profiles
                .iter()
                .map(|profile| profile.weighted_log_density(point))
                .collect::<Vec<_>>();
            let total = log_sum_exp(&logs);
            if total.is_finite() {
                logs.iter().map(|log| (log - total).exp()).collect()
            } else {
                vec![1.0 / logs.len() as f64; logs.len()]
            }
        })
        .collect()
}

/// M step: re-estimates every profile from the responsibilities.
///
/// A profile that received (almost) no responsibility keeps its previous mean
/// and covariance. Weights are renormalized to sum to 1.
#[expect(clippy::cast_precision_loss)]
pub fn m_step(
    data: &[[f64; 2]],
    responsibilities: &[Vec<f64>],
    previous: &[Profile],
) -> Result<Vec<Profile>, ModelError> {
    if responsibilities.len() != data.len() {
        return Err(ModelError::DimensionMismatch {
            expected: data.len(),
            actual: responsibilities.len(),
        });
    }
    if let Some(row) = responsibilities.iter().find(|row| row.len() != previous.len()) {
        return Err(ModelError::DimensionMismatch {
            expected: previous.len(),
            actual: row.len(),
        });
    }

    let n = data.len() as f64;
    let mut profiles = previous
        .iter()
        .enumerate()
        .map(|(k, old)| {
            let column = responsibilities.iter().map(|row| row[k]).collect::<Vec<_>>();
            let mass = column.iter().sum::<f64>();
            if mass < EMPTY_PROFILE_MASS {
                tracing::debug!(profile = old.id, "profile lost all responsibility");
                return Profile {
                    weight: mass / n,
                    ..*old
                };
            }
            let mean = weighted_mean(data, &column);
            Profile {
                id: old.id,
                mean,
                covariance: weighted_covariance(data, &column, mean),
                weight: mass / n,
            }
        })
        .collect::<Vec<_>>();

    let total_weight = profiles.iter().map(|p| p.weight).sum::<f64>();
    if total_weight > 0.0 {
        for profile in &mut profiles {
            profile.weight /= total_weight;
        }
    } else {
        let uniform = 1.0 / profiles.len() as f64;
        for profile in &mut profiles {
            profile.weight = uniform;
        }
    }
    Ok(profiles)
}

/// One full EM iteration.
pub fn em_step(data: &[[f64; 2]], profiles: &[Profile]) -> Result<EmStep, ModelError> {
    let responsibilities = e_step(data, profiles);
    let profiles = m_step(data, &responsibilities, profiles)?;
    let log_likelihood = log_likelihood(data, &profiles);
    tracing::debug!(log_likelihood, "EM iteration");
    Ok(EmStep {
        profiles,
        log_likelihood,
    })
}

/// Log-likelihood of `data` under the mixture.
#[must_use]
pub fn log_likelihood(data: &[[f64; 2]], profiles: &[Profile]) -> f64 {
    data.iter()
        .map(|&point| {
            let logs = profiles
                .iter()
                .map(|profile| profile.weighted_log_density(point))
                .collect::<Vec<_>>();
            log_sum_exp(&logs)
        })
        .sum()
}

/// Bayesian information criterion; lower is better.
///
/// A `k`-profile bivariate model has `6k - 1` free parameters: two means and
/// three covariance entries per profile plus `k - 1` weights.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn bic(log_likelihood: f64, profile_count: usize, observations: usize) -> f64 {
    let parameters = (6 * profile_count).saturating_sub(1) as f64;
    -2.0 * log_likelihood + parameters * (observations.max(1) as f64).ln()
}

/// Index of the most responsible profile for each observation.
#[must_use]
pub fn assign_profiles(data: &[[f64; 2]], profiles: &[Profile]) -> Vec<usize> {
    e_step(data, profiles)
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (k, &r)| if r > best.1 { (k, r) } else { best })
                .0
        })
        .collect()
}

fn log_sum_exp(logs: &[f64]) -> f64 {
    let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + logs.iter().map(|log| (log - max).exp()).sum::<f64>().ln()
}

fn weighted_mean(data: &[[f64; 2]], weights: &[f64]) -> [f64; 2] {
    let mass = weights.iter().sum::<f64>();
    if mass <= 0.0 {
        return [0.0, 0.0];
    }
    let (sx, sy) = data
        .iter()
        .zip(weights)
        .fold((0.0, 0.0), |(sx, sy), (p, w)| (sx + w * p[0], sy + w * p[1]));
    [sx / mass, sy / mass]
}

fn weighted_covariance(data: &[[f64; 2]], weights: &[f64], mean: [f64; 2]) -> [[f64; 2]; 2] {
    let mass = weights.iter().sum::<f64>();
    let (mut xx, mut xy, mut yy) = (0.0, 0.0, 0.0);
    if mass > 0.0 {
        for (p, w) in data.iter().zip(weights) {
            let dx = p[0] - mean[0];
            let dy = p[1] - mean[1];
            xx += w * dx * dx;
            xy += w * dx * dy;
            yy += w * dy * dy;
        }
        xx /= mass;
        xy /= mass;
        yy /= mass;
    }
    [[xx + COVARIANCE_RIDGE, xy], [xy, yy + COVARIANCE_RIDGE]]
}
