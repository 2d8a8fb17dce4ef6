//! Normal variates via the Box–Muller transform.
//!
//! Two independent uniforms `u₁ ∈ (0, 1]` and `u₂ ∈ [0, 1)` give two
//! independent standard normals:
//!
//! ```text
//! z₁ = √(-2 ln u₁) · cos(2π u₂)
//! z₂ = √(-2 ln u₁) · sin(2π u₂)
//! ```

use std::f64::consts::TAU;

use rand::Rng;
use statlab_stats::inference::DistributionParams;

use crate::SynthError;

/// Maps two uniforms to two independent standard normals.
///
/// `u1` must be in `(0, 1]`; `u1 = 0` would need `ln 0`.
#[must_use]
pub fn box_muller(u1: f64, u2: f64) -> (f64, f64) {
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = TAU * u2;
    (radius * angle.cos(), radius * angle.sin())
}

/// Draws one standard normal variate.
pub fn standard_normal<R>(rng: &mut R) -> f64
where
    R: Rng + ?Sized,
{
    standard_normal_pair(rng).0
}

/// Draws two independent standard normal variates.
pub fn standard_normal_pair<R>(rng: &mut R) -> (f64, f64)
where
    R: Rng + ?Sized,
{
    // `random` is in [0, 1); flip it into (0, 1] for the logarithm.
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    box_muller(u1, u2)
}

/// Draws `n` values from `N(mean, std_dev²)`.
///
/// Both outputs of each Box–Muller pair are used.
pub fn normal_samples<R>(mean: f64, std_dev: f64, n: usize, rng: &mut R) -> Result<Vec<f64>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_std_dev("std_dev", std_dev)?;
    let mut samples = Vec::with_capacity(n + 1);
    while samples.len() < n {
        let (z1, z2) = standard_normal_pair(rng);
        samples.push(mean + std_dev * z1);
        samples.push(mean + std_dev * z2);
    }
    samples.truncate(n);
    Ok(samples)
}

/// Draws a sample of `params.size` values with the given mean and standard deviation.
pub fn sample_distribution<R>(params: &DistributionParams, rng: &mut R) -> Result<Vec<f64>, SynthError>
where
    R: Rng + ?Sized,
{
    normal_samples(params.mean, params.std_dev, params.size, rng)
}

#[cfg(test)]
mod tests {
    use statlab_stats::descriptive;

    use super::*;
    use crate::seeded_rng;

    #[test]
    fn test_box_muller_known_values() {
        let (z1, z2) = box_muller(1.0, 0.25);
        assert_eq!(z1, 0.0);
        assert_eq!(z2, 0.0);

        let (z1, z2) = box_muller((-0.5_f64).exp(), 0.0);
        assert!((z1 - 1.0).abs() < 1e-12);
        assert!(z2.abs() < 1e-12);
    }

    #[test]
    fn test_samples_match_requested_moments() {
        let mut rng = seeded_rng(11);
        let samples = normal_samples(50.0, 10.0, 5001, &mut rng).unwrap();
        assert_eq!(samples.len(), 5001);
        assert!((descriptive::mean(&samples).unwrap() - 50.0).abs() < 0.5);
        assert!((descriptive::std_dev(&samples).unwrap() - 10.0).abs() < 0.5);
        assert!(samples.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_zero_std_dev_gives_constant_sample() {
        let mut rng = seeded_rng(0);
        let samples = normal_samples(3.0, 0.0, 10, &mut rng).unwrap();
        assert!(samples.iter().all(|&x| x == 3.0));
    }

    #[test]
    fn test_rejects_negative_std_dev() {
        let mut rng = seeded_rng(0);
        assert!(normal_samples(0.0, -1.0, 10, &mut rng).is_err());
    }

    #[test]
    fn test_same_seed_same_sample() {
        let params = DistributionParams {
            mean: 100.0,
            std_dev: 15.0,
            size: 30,
        };
        let a = sample_distribution(&params, &mut seeded_rng(5)).unwrap();
        let b = sample_distribution(&params, &mut seeded_rng(5)).unwrap();
        assert_eq!(a, b);
    }
}
