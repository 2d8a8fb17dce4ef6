//! Hypothesis tests and interval estimates.
//!
//! The p-values produced here come from the approximations in
//! [`approx`](crate::approx): z-statistics use the normal CDF, chi-square and
//! F statistics use cube-root normal approximations, and confidence intervals
//! use tabulated z critical values rather than the t distribution. Results are
//! meant for introductory lessons, not for publication-grade analysis.

use serde::{Deserialize, Serialize};

use crate::{
    StatsError, approx,
    descriptive::{self, sum_of_squares},
};

/// Significance level used for the `significant` flags.
pub const ALPHA: f64 = 0.05;

/// Teaching threshold on `|t|` above which a group difference is called significant.
pub const EFFECT_T_THRESHOLD: f64 = 2.0;

/// Summary parameters of one sample or population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionParams {
    pub mean: f64,
    pub std_dev: f64,
    pub size: usize,
}

impl DistributionParams {
    /// Summarizes observed values (sample standard deviation).
    pub fn from_values(values: &[f64]) -> Result<Self, StatsError> {
        Ok(Self {
            mean: descriptive::mean(values)?,
            std_dev: descriptive::std_dev(values)?,
            size: values.len(),
        })
    }

    fn validate(&self, name: &'static str) -> Result<(), StatsError> {
        if self.size == 0 {
            return Err(StatsError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }
        if !self.std_dev.is_finite() || self.std_dev < 0.0 {
            return Err(StatsError::OutOfRange {
                name,
                value: self.std_dev,
                expected: "[0, ∞)",
            });
        }
        Ok(())
    }

    /// Squared standard error contribution `σ² / n`.
    #[expect(clippy::cast_precision_loss)]
    fn variance_of_mean(&self) -> f64 {
        self.std_dev * self.std_dev / self.size as f64
    }
}

/// A rectangular matrix of non-negative counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u64>>", into = "Vec<Vec<u64>>")]
pub struct ContingencyTable {
    cells: Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// Creates a table, rejecting empty or ragged input.
    pub fn new(cells: Vec<Vec<u64>>) -> Result<Self, StatsError> {
        let columns = cells.first().map_or(0, Vec::len);
        if cells.is_empty() || columns == 0 {
            return Err(StatsError::RaggedTable {
                row: 0,
                actual: 0,
                expected: 1,
            });
        }
        if let Some((row, r)) = cells.iter().enumerate().find(|(_, r)| r.len() != columns) {
            return Err(StatsError::RaggedTable {
                row,
                actual: r.len(),
                expected: columns,
            });
        }
        Ok(Self { cells })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn columns(&self) -> usize {
        self.cells[0].len()
    }

    #[must_use]
    pub fn cells(&self) -> &[Vec<u64>] {
        &self.cells
    }

    #[must_use]
    pub fn row_totals(&self) -> Vec<u64> {
        self.cells.iter().map(|r| r.iter().sum()).collect()
    }

    #[must_use]
    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.columns())
            .map(|c| self.cells.iter().map(|r| r[c]).sum())
            .collect()
    }

    #[must_use]
    pub fn grand_total(&self) -> u64 {
        self.row_totals().iter().sum()
    }
}

impl TryFrom<Vec<Vec<u64>>> for ContingencyTable {
    type Error = StatsError;

    fn try_from(cells: Vec<Vec<u64>>) -> Result<Self, Self::Error> {
        Self::new(cells)
    }
}

impl From<ContingencyTable> for Vec<Vec<u64>> {
    fn from(table: ContingencyTable) -> Self {
        table.cells
    }
}

/// Outcome of a chi-square test of independence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChiSquareResult {
    pub chi_square: f64,
    pub degrees_of_freedom: usize,
    /// Approximate upper-tail probability (see [`approx::chi_square_p_value`]).
    pub p_value: f64,
    /// Expected counts under independence, same shape as the observed table.
    pub expected: Vec<Vec<f64>>,
    /// Cramér's V effect size in `[0, 1]`.
    pub cramers_v: f64,
    pub significant: bool,
}

/// Chi-square test of independence.
///
/// Expected counts are `row total × column total / grand total`. Cells with a
/// zero expected count contribute nothing; an all-zero table yields
/// `chi_square = 0` and `p_value = 1`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn chi_square_test(table: &ContingencyTable) -> ChiSquareResult {
    let row_totals = table.row_totals();
    let column_totals = table.column_totals();
    let grand_total = table.grand_total() as f64;

    let expected = row_totals
        .iter()
        .map(|&row_total| {
            column_totals
                .iter()
                .map(|&column_total| {
                    if grand_total > 0.0 {
                        row_total as f64 * column_total as f64 / grand_total
                    } else {
                        0.0
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    let chi_square = table
        .cells()
        .iter()
        .zip(&expected)
        .flat_map(|(observed_row, expected_row)| observed_row.iter().zip(expected_row))
        .filter(|(_, e)| **e > 0.0)
        .map(|(&o, &e)| (o as f64 - e).powi(2) / e)
        .sum::<f64>();

    let degrees_of_freedom = (table.rows() - 1) * (table.columns() - 1);
    let p_value = approx::chi_square_p_value(chi_square, degrees_of_freedom);
    let min_dimension = table.rows().min(table.columns()) - 1;
    let cramers_v = if grand_total > 0.0 && min_dimension > 0 {
        (chi_square / (grand_total * min_dimension as f64))
            .sqrt()
            .clamp(0.0, 1.0)
    } else {
        0.0
    };

    ChiSquareResult {
        chi_square,
        degrees_of_freedom,
        p_value,
        expected,
        cramers_v,
        significant: p_value < ALPHA,
    }
}

/// Outcome of a z-style test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZTestResult {
    pub z: f64,
    pub p_value: f64,
    pub standard_error: f64,
    pub significant: bool,
}

impl ZTestResult {
    fn from_difference(difference: f64, standard_error: f64) -> Self {
        // Zero spread: no evidence either way.
        if standard_error <= f64::EPSILON {
            return Self {
                z: 0.0,
                p_value: 1.0,
                standard_error: 0.0,
                significant: false,
            };
        }
        let z = difference / standard_error;
        let p_value = approx::two_tailed_p_value(z);
        Self {
            z,
            p_value,
            standard_error,
            significant: p_value < ALPHA,
        }
    }
}

/// Two-sided one-sample z-test of `sample.mean` against `population_mean`.
pub fn one_sample_z_test(
    sample: &DistributionParams,
    population_mean: f64,
) -> Result<ZTestResult, StatsError> {
    sample.validate("std_dev")?;
    Ok(ZTestResult::from_difference(
        sample.mean - population_mean,
        sample.variance_of_mean().sqrt(),
    ))
}

/// Two-sided two-sample z-test of `b.mean - a.mean` with unpooled standard error.
pub fn two_sample_z_test(
    a: &DistributionParams,
    b: &DistributionParams,
) -> Result<ZTestResult, StatsError> {
    a.validate("a.std_dev")?;
    b.validate("b.std_dev")?;
    Ok(ZTestResult::from_difference(
        b.mean - a.mean,
        (a.variance_of_mean() + b.variance_of_mean()).sqrt(),
    ))
}

/// Standardized difference between two groups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EffectSize {
    /// Cohen's d using the pooled standard deviation.
    pub cohens_d: f64,
    /// Welch-style t statistic of `b.mean - a.mean`.
    pub t_statistic: f64,
    /// `|t| > 2.0`, the rule of thumb the lessons teach.
    pub significant: bool,
}

/// Effect size of `b` relative to `a`.
///
/// Zero pooled spread yields `d = 0` and `t = 0`.
#[expect(clippy::cast_precision_loss)]
pub fn effect_size(a: &DistributionParams, b: &DistributionParams) -> Result<EffectSize, StatsError> {
    a.validate("a.std_dev")?;
    b.validate("b.std_dev")?;

    let difference = b.mean - a.mean;
    let pooled_df = (a.size + b.size).saturating_sub(2).max(1) as f64;
    let pooled_variance = ((a.size.saturating_sub(1)) as f64 * a.std_dev.powi(2)
        + (b.size.saturating_sub(1)) as f64 * b.std_dev.powi(2))
        / pooled_df;
    let pooled_sd = pooled_variance.sqrt();
    let cohens_d = if pooled_sd > f64::EPSILON {
        difference / pooled_sd
    } else {
        0.0
    };

    let standard_error = (a.variance_of_mean() + b.variance_of_mean()).sqrt();
    let t_statistic = if standard_error > f64::EPSILON {
        difference / standard_error
    } else {
        0.0
    };

    Ok(EffectSize {
        cohens_d,
        t_statistic,
        significant: t_statistic.abs() > EFFECT_T_THRESHOLD,
    })
}

/// One-way analysis of variance table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnovaResult {
    pub ss_between: f64,
    pub ss_within: f64,
    pub ss_total: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub ms_between: f64,
    pub ms_within: f64,
    pub f_statistic: f64,
    /// Approximate upper-tail probability (see [`approx::f_p_value`]).
    pub p_value: f64,
    /// Proportion of total variation explained by group membership.
    pub eta_squared: f64,
    pub significant: bool,
}

/// One-way ANOVA over `groups`.
///
/// Requires at least two non-empty groups. With no within-group variation the
/// F statistic is reported as `0` with `p_value = 1`.
#[expect(clippy::cast_precision_loss)]
pub fn anova<G>(groups: &[G]) -> Result<AnovaResult, StatsError>
where
    G: AsRef<[f64]>,
{
    StatsError::check_len(groups, 2)?;
    if let Some(empty) = groups.iter().find(|g| g.as_ref().is_empty()) {
        return Err(StatsError::InsufficientData {
            required: 1,
            actual: empty.as_ref().len(),
        });
    }

    let all = groups
        .iter()
        .flat_map(|g| g.as_ref().iter().copied())
        .collect::<Vec<_>>();
    let grand_mean = descriptive::mean(&all)?;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let values = group.as_ref();
        let group_mean = descriptive::mean(values)?;
        ss_between += values.len() as f64 * (group_mean - grand_mean).powi(2);
        ss_within += sum_of_squares(values, group_mean);
    }
    let ss_total = sum_of_squares(&all, grand_mean);

    let df_between = groups.len() - 1;
    let df_within = all.len() - groups.len();
    let ms_between = ss_between / df_between as f64;
    let ms_within = if df_within > 0 {
        ss_within / df_within as f64
    } else {
        0.0
    };

    let (f_statistic, p_value) = if ms_within > f64::EPSILON {
        let f = ms_between / ms_within;
        (f, approx::f_p_value(f, df_between, df_within))
    } else {
        (0.0, 1.0)
    };
    let eta_squared = if ss_total > f64::EPSILON {
        (ss_between / ss_total).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok(AnovaResult {
        ss_between,
        ss_within,
        ss_total,
        df_between,
        df_within,
        ms_between,
        ms_within,
        f_statistic,
        p_value,
        eta_squared,
        significant: p_value < ALPHA,
    })
}

/// A two-sided interval estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
    pub margin_of_error: f64,
    pub confidence_level: f64,
    pub z_critical: f64,
}

impl ConfidenceInterval {
    fn around(estimate: f64, standard_error: f64, confidence_level: f64) -> Self {
        let z_critical = approx::z_critical(confidence_level);
        let margin_of_error = z_critical * standard_error;
        Self {
            estimate,
            lower: estimate - margin_of_error,
            upper: estimate + margin_of_error,
            margin_of_error,
            confidence_level,
            z_critical,
        }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }

    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

fn check_confidence_level(confidence_level: f64) -> Result<(), StatsError> {
    if confidence_level > 0.0 && confidence_level < 1.0 {
        Ok(())
    } else {
        Err(StatsError::OutOfRange {
            name: "confidence_level",
            value: confidence_level,
            expected: "(0, 1)",
        })
    }
}

/// z-approximate confidence interval for the mean of `values`.
///
/// # Examples
///
/// ```
/// # use statlab_stats::inference::confidence_interval;
/// let ci = confidence_interval(&[9.0, 10.0, 11.0, 10.0], 0.95).unwrap();
/// assert!(ci.contains(10.0));
/// assert_eq!(ci.z_critical, 1.96);
/// ```
pub fn confidence_interval(
    values: &[f64],
    confidence_level: f64,
) -> Result<ConfidenceInterval, StatsError> {
    let params = DistributionParams::from_values(values)?;
    confidence_interval_from_params(&params, confidence_level)
}

/// z-approximate confidence interval for a mean given summary parameters.
pub fn confidence_interval_from_params(
    params: &DistributionParams,
    confidence_level: f64,
) -> Result<ConfidenceInterval, StatsError> {
    check_confidence_level(confidence_level)?;
    params.validate("std_dev")?;
    Ok(ConfidenceInterval::around(
        params.mean,
        params.variance_of_mean().sqrt(),
        confidence_level,
    ))
}

/// Wald interval for a proportion, clamped to `[0, 1]`.
#[expect(clippy::cast_precision_loss)]
pub fn proportion_confidence_interval(
    successes: u64,
    trials: u64,
    confidence_level: f64,
) -> Result<ConfidenceInterval, StatsError> {
    check_confidence_level(confidence_level)?;
    if trials == 0 {
        return Err(StatsError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    if successes > trials {
        return Err(StatsError::OutOfRange {
            name: "successes",
            value: successes as f64,
            expected: "[0, trials]",
        });
    }
    let p = successes as f64 / trials as f64;
    let standard_error = (p * (1.0 - p) / trials as f64).sqrt();
    let mut interval = ConfidenceInterval::around(p, standard_error, confidence_level);
    interval.lower = interval.lower.max(0.0);
    interval.upper = interval.upper.min(1.0);
    Ok(interval)
}
