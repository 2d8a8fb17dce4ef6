//! Statistical building blocks for the statlab lesson engine.
//!
//! This crate provides the pure computations behind the statistics lessons:
//!
//! - **Numeric approximations**: Normal CDF, inverse normal CDF, critical values and
//!   approximate p-values used by the inferential routines
//! - **Descriptive statistics**: Mean, variance, standard deviation, standard error
//! - **Regression**: Ordinary least squares lines, R², correlation
//! - **Inference**: Chi-square test of independence, z-tests, ANOVA, confidence intervals
//! - **Survival analysis**: Kaplan-Meier estimator and log-rank comparison
//!
//! Every function is a pure transform of its inputs. Malformed parameters are
//! rejected with [`StatsError`]; mathematically degenerate data (zero variance,
//! vertical lines, empty cells) falls back to documented neutral values instead.
//!
//! # Modules
//!
//! - [`approx`]: Teaching-grade approximations with documented error bounds
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//! - [`regression`]: Least-squares lines and correlation over 2D points
//! - [`inference`]: Hypothesis tests and interval estimates
//! - [`survival`]: Kaplan-Meier survival curves for time-to-event data
//!
//! # Examples
//!
//! ## Fitting a line
//!
//! ```
//! use statlab_stats::regression::{Point, RegressionLine, r_squared};
//!
//! let points = [Point::new(0, 0.0, 0.0), Point::new(1, 10.0, 10.0), Point::new(2, 20.0, 20.0)];
//! let line = RegressionLine::fit(&points);
//! assert_eq!(line.slope, 1.0);
//! assert_eq!(line.intercept, 0.0);
//! assert_eq!(r_squared(&points, &line), 1.0);
//! ```
//!
//! ## Testing independence
//!
//! ```
//! use statlab_stats::inference::{ContingencyTable, chi_square_test};
//!
//! let table = ContingencyTable::new(vec![vec![30, 10], vec![15, 25]]).unwrap();
//! let result = chi_square_test(&table);
//! assert!(result.chi_square > 0.0);
//! ```
//!
//! ## Analyzing survival data
//!
//! ```
//! use statlab_stats::survival::{KaplanMeierCurve, SurvivalDataPoint};
//!
//! let records = vec![
//!     SurvivalDataPoint::event(10.0, "A"),
//!     SurvivalDataPoint::censored(20.0, "A"),
//!     SurvivalDataPoint::event(30.0, "A"),
//! ];
//! let curve = KaplanMeierCurve::from_records(&records);
//! assert_eq!(curve.survival_at(5.0), 1.0);
//! ```

pub mod approx;
pub mod descriptive;
pub mod inference;
pub mod regression;
pub mod survival;

/// Rejection of malformed input to a statistical routine.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum StatsError {
    #[display("insufficient data: at least {required} observation(s) required, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[display("parameter '{name}' = {value} is outside {expected}")]
    OutOfRange {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },
    #[display("length mismatch: '{left}' has {left_len} values but '{right}' has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },
    #[display("contingency table must be a non-empty rectangle (row {row} has {actual} columns, expected {expected})")]
    RaggedTable {
        row: usize,
        actual: usize,
        expected: usize,
    },
}

impl StatsError {
    pub(crate) fn check_probability(name: &'static str, value: f64) -> Result<f64, Self> {
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

    pub(crate) fn check_len<T>(values: &[T], required: usize) -> Result<(), Self> {
        if values.len() < required {
            return Err(Self::InsufficientData {
                required,
                actual: values.len(),
            });
        }
        Ok(())
    }
}
