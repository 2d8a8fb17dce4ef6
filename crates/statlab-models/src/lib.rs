//! Iterative, probabilistic and quasi-experimental models for the statlab lessons.
//!
//! Each module is independently callable and holds no state between calls.
//! Iterative algorithms ([`kmeans`], [`profile`]) expose single-step functions;
//! the caller owns the run/pause/step loop and threads the previous state into
//! the next call.
//!
//! # Modules
//!
//! - [`kmeans`]: Assign/update clustering with a step-driven session
//! - [`decision_tree`]: Gini-based recursive binary splitting over two features
//! - [`bkt`]: Bayesian Knowledge Tracing mastery updates
//! - [`profile`]: Expectation-Maximization for bivariate latent profiles
//! - [`matching`]: Greedy nearest-neighbor propensity-score matching
//! - [`discontinuity`]: Regression-discontinuity effect estimation
//! - [`attribution`]: Additive feature attribution for linear models
//! - [`sequence`]: Frequent pattern and lag-sequential analysis of action logs
//! - [`factor`]: Principal components and simplified factor analysis
//!
//! # Example
//!
//! ```
//! use statlab_models::bkt::{BktParams, update_mastery};
//!
//! let params = BktParams::new(0.1, 0.2, 0.1).unwrap();
//! let after_correct = update_mastery(0.25, true, &params);
//! assert!(after_correct > 0.25);
//! ```

use statlab_stats::StatsError;

pub mod attribution;
pub mod bkt;
pub mod decision_tree;
pub mod discontinuity;
pub mod factor;
pub mod kmeans;
pub mod matching;
pub mod profile;
pub mod sequence;

/// Rejection of malformed model input.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum ModelError {
    #[from]
    #[display("{_0}")]
    Stats(StatsError),
    #[display("parameter '{name}' = {value} is outside {expected}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[display("at least {required} {what} required, got {actual}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        actual: usize,
    },
    #[display("dimension mismatch: expected {expected} values per row, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[display("duplicate record id {id}")]
    DuplicateId { id: u32 },
}

impl ModelError {
    pub(crate) fn check_unit_interval(name: &'static str, value: f64) -> Result<f64, Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(Self::OutOfRange {
                name,
                value,
                expected: "[0, 1]",
            })
        }
    }

    pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(value)
        } else {
            Err(Self::OutOfRange {
                name,
                value,
                expected: "[0, ∞)",
            })
        }
    }
}
