//! Sharp regression-discontinuity effect estimation.
//!
//! Observations within `bandwidth` of the cutoff are split by side, a local
//! OLS line is fitted on each side independently, and the effect is the gap
//! between the two lines evaluated exactly at the cutoff:
//!
//! ```text
//! effect = treated_line(cutoff) - control_line(cutoff)
//! ```
//!
//! A side with fewer than two points (or no spread in `x`) gets the
//! horizontal fallback line. The estimate is still returned but flagged as
//! low confidence.

use serde::{Deserialize, Serialize};
use statlab_stats::regression::{self, Point, RegressionLine};

use crate::ModelError;

/// Fewest points per side for a trustworthy local line.
pub const MIN_POINTS_PER_SIDE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RddParams {
    pub cutoff: f64,
    /// Half-width of the window around the cutoff.
    pub bandwidth: f64,
    /// Whether units at or above the cutoff are treated.
    pub treatment_above: bool,
}

impl Default for RddParams {
    fn default() -> Self {
        Self {
            cutoff: 50.0,
            bandwidth: 20.0,
            treatment_above: true,
        }
    }
}

impl RddParams {
    /// Whether a running-variable value falls on the treated side.
    #[must_use]
    pub fn is_treated(&self, x: f64) -> bool {
        (x >= self.cutoff) == self.treatment_above
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RddEstimate {
    pub effect: f64,
    pub treated_line: RegressionLine,
    pub control_line: RegressionLine,
    pub treated_count: usize,
    pub control_count: usize,
    /// Set when either side had too few points or no spread in `x`.
    pub low_confidence: bool,
}

/// Estimates the treatment effect at the cutoff.
///
/// # Examples
///
/// ```
/// # use statlab_models::discontinuity::{RddParams, estimate_effect};
/// # use statlab_stats::regression::Point;
/// let points = (0..20)
///     .map(|i| {
///         let x = f64::from(i);
///         let jump = if x >= 10.0 { 5.0 } else { 0.0 };
///         Point::new(i, x, x + jump)
///     })
///     .collect::<Vec<_>>();
/// let params = RddParams { cutoff: 10.0, bandwidth: 10.0, treatment_above: true };
/// let estimate = estimate_effect(&points, &params).unwrap();
/// assert!((estimate.effect - 5.0).abs() < 1e-9);
/// assert!(!estimate.low_confidence);
/// ```
pub fn estimate_effect(points: &[Point], params: &RddParams) -> Result<RddEstimate, ModelError> {
    if !params.cutoff.is_finite() {
        return Err(ModelError::OutOfRange {
            name: "cutoff",
            value: params.cutoff,
            expected: "a finite value",
        });
    }
    ModelError::check_non_negative("bandwidth", params.bandwidth)?;

    let (treated, control): (Vec<Point>, Vec<Point>) = points
        .iter()
        .filter(|p| (p.x - params.cutoff).abs() <= params.bandwidth)
        .copied()
        .partition(|p| params.is_treated(p.x));

    let treated_fit = regression::fit_line_with_diagnostics(&treated);
    let control_fit = regression::fit_line_with_diagnostics(&control);
    let low_confidence = treated.len() < MIN_POINTS_PER_SIDE
        || control.len() < MIN_POINTS_PER_SIDE
        || treated_fit.degenerate
        || control_fit.degenerate;
    if low_confidence {
        tracing::warn!(
            treated = treated.len(),
            control = control.len(),
            bandwidth = params.bandwidth,
            "too little data near the cutoff; effect is low confidence"
        );
    }

    let effect = treated_fit.line.predict(params.cutoff) - control_fit.line.predict(params.cutoff);
    Ok(RddEstimate {
        effect,
        treated_line: treated_fit.line,
        control_line: control_fit.line,
        treated_count: treated.len(),
        control_count: control.len(),
        low_confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stepped(jump: f64) -> Vec<Point> {
        (0..100)
            .map(|i| {
                let x = f64::from(i);
                let y = 2.0 * x + if x >= 50.0 { jump } else { 0.0 };
                Point::new(i, x, y)
            })
            .collect()
    }

    #[test]
    fn test_recovers_known_jump() {
        let estimate = estimate_effect(&stepped(8.0), &RddParams::default()).unwrap();
        assert!((estimate.effect - 8.0).abs() < 1e-9);
        assert!((estimate.treated_line.slope - 2.0).abs() < 1e-9);
        assert_eq!(estimate.treated_count, 21);
        assert_eq!(estimate.control_count, 20);
    }

    #[test]
    fn test_treatment_below_flips_sign() {
        let params = RddParams {
            treatment_above: false,
            ..RddParams::default()
        };
        let estimate = estimate_effect(&stepped(8.0), &params).unwrap();
        assert!((estimate.effect + 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_sparse_side_is_low_confidence() {
        let points = [
            Point::new(0, 48.0, 1.0),
            Point::new(1, 49.0, 2.0),
            Point::new(2, 51.0, 10.0),
        ];
        let estimate = estimate_effect(&points, &RddParams::default()).unwrap();
        assert!(estimate.low_confidence);
        assert!(estimate.effect.is_finite());
    }

    #[test]
    fn test_empty_window_does_not_fail() {
        let estimate = estimate_effect(&[], &RddParams::default()).unwrap();
        assert!(estimate.low_confidence);
        assert_eq!(estimate.effect, 0.0);
    }

    #[test]
    fn test_rejects_negative_bandwidth() {
        let params = RddParams {
            bandwidth: -1.0,
            ..RddParams::default()
        };
        assert!(estimate_effect(&stepped(1.0), &params).is_err());
    }
}
