//! Bayesian Knowledge Tracing.
//!
//! A two-state (known / unknown) hidden Markov model of skill mastery. Each
//! observed answer is folded into the current mastery estimate in two steps:
//!
//! 1. Bayes' rule gives `P(known | answer)`:
//!    - correct: `p(1 - slip) / (p(1 - slip) + (1 - p)·guess)`
//!    - incorrect: `p·slip / (p·slip + (1 - p)(1 - guess))`
//! 2. The learning transition: `posterior + (1 - posterior)·learn`
//!
//! Updates are order-dependent. The caller keeps the mastery history and must
//! apply exactly one update per observed answer, in the order they happened.

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Mastery at or above which a skill counts as learned.
pub const MASTERY_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BktParams {
    /// Probability of moving from unknown to known after a practice opportunity.
    pub learn: f64,
    /// Probability of answering correctly without knowing the skill.
    pub guess: f64,
    /// Probability of answering incorrectly despite knowing the skill.
    pub slip: f64,
}

impl BktParams {
    /// Creates parameters, rejecting values outside `[0, 1]`.
    pub fn new(learn: f64, guess: f64, slip: f64) -> Result<Self, ModelError> {
        Ok(Self {
            learn: ModelError::check_unit_interval("learn", learn)?,
            guess: ModelError::check_unit_interval("guess", guess)?,
            slip: ModelError::check_unit_interval("slip", slip)?,
        })
    }
}

impl Default for BktParams {
    fn default() -> Self {
        Self {
            learn: 0.1,
            guess: 0.2,
            slip: 0.1,
        }
    }
}

/// Folds one observed answer into `mastery`.
///
/// The result is clamped to `[0, 1]`. If the evidence has zero probability
/// under the current estimate (e.g. `guess = 0` and `mastery = 0` with a
/// correct answer), the posterior keeps the prior.
///
/// # Examples
///
/// ```
/// # use statlab_models::bkt::{BktParams, update_mastery};
/// let params = BktParams::default();
/// let next = update_mastery(0.25, true, &params);
/// assert!((next - 0.64).abs() < 1e-12);
/// ```
#[must_use]
pub fn update_mastery(mastery: f64, correct: bool, params: &BktParams) -> f64 {
    let p = mastery.clamp(0.0, 1.0);
    let (known, unknown) = if correct {
        (p * (1.0 - params.slip), (1.0 - p) * params.guess)
    } else {
        (p * params.slip, (1.0 - p) * (1.0 - params.guess))
    };
    let evidence = known + unknown;
    let posterior = if evidence > 0.0 { known / evidence } else { p };
    (posterior + (1.0 - posterior) * params.learn).clamp(0.0, 1.0)
}

/// Probability that the next answer is correct given the current mastery.
#[must_use]
pub fn predict_correct(mastery: f64, params: &BktParams) -> f64 {
    let p = mastery.clamp(0.0, 1.0);
    (p * (1.0 - params.slip) + (1.0 - p) * params.guess).clamp(0.0, 1.0)
}

/// Mastery after each answer in `outcomes`, starting from `initial`.
///
/// The returned history has `outcomes.len() + 1` entries; the first one is
/// the (clamped) initial mastery.
#[must_use]
pub fn trace_mastery(initial: f64, outcomes: &[bool], params: &BktParams) -> Vec<f64> {
    let mut history = Vec::with_capacity(outcomes.len() + 1);
    history.push(initial.clamp(0.0, 1.0));
    let mut mastery = initial;
    for &correct in outcomes {
        mastery = update_mastery(mastery, correct, params);
        history.push(mastery);
    }
    history
}

#[must_use]
pub fn is_mastered(mastery: f64) -> bool {
    mastery >= MASTERY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use rand::{Rng as _, SeedableRng as _};
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn test_params_validation() {
        assert!(BktParams::new(0.1, 0.2, 0.1).is_ok());
        assert_eq!(
            BktParams::new(0.1, 1.2, 0.1),
            Err(ModelError::OutOfRange {
                name: "guess",
                value: 1.2,
                expected: "[0, 1]"
            })
        );
        assert!(BktParams::new(-0.1, 0.2, 0.1).is_err());
    }

    #[test]
    fn test_correct_raises_incorrect_lowers() {
        let params = BktParams::new(0.1, 0.2, 0.1).unwrap();
        let up = update_mastery(0.25, true, &params);
        let down = update_mastery(0.25, false, &params);
        assert!(up > 0.25);
        assert!(down < 0.25);
        assert!((down - 0.136).abs() < 1e-12);
    }

    #[test]
    fn test_mastery_stays_in_unit_interval() {
        let params = BktParams::new(0.1, 0.2, 0.1).unwrap();
        let mut rng = Pcg32::seed_from_u64(100);
        let outcomes = (0..100).map(|_| rng.random_bool(0.6)).collect::<Vec<_>>();
        let history = trace_mastery(0.25, &outcomes, &params);
        assert_eq!(history.len(), 101);
        assert!(history.iter().all(|m| (0.0..=1.0).contains(m)));
    }

    #[test]
    fn test_updates_do_not_commute() {
        let params = BktParams::new(0.3, 0.2, 0.1).unwrap();
        let a = trace_mastery(0.25, &[true, false], &params);
        let b = trace_mastery(0.25, &[false, true], &params);
        assert_ne!(a[2], b[2]);
    }

    #[test]
    fn test_zero_probability_evidence_keeps_prior() {
        let params = BktParams::new(0.0, 0.0, 0.0).unwrap();
        assert_eq!(update_mastery(0.0, true, &params), 0.0);
        assert_eq!(update_mastery(1.0, false, &params), 1.0);
    }

    #[test]
    fn test_consistent_success_reaches_mastery() {
        let params = BktParams::default();
        let history = trace_mastery(0.1, &[true; 10], &params);
        assert!(is_mastered(*history.last().unwrap()));
        assert!(history.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_predict_correct_bounds() {
        let params = BktParams::default();
        assert!((predict_correct(0.0, &params) - params.guess).abs() < 1e-12);
        assert!((predict_correct(1.0, &params) - (1.0 - params.slip)).abs() < 1e-12);
    }
}
