use serde::Serialize;

use crate::StatsError;

/// Arithmetic mean of a dataset.
///
/// # Examples
///
/// ```
/// # use statlab_stats::descriptive::mean;
/// assert_eq!(mean(&[1.0, 2.0, 3.0]).unwrap(), 2.0);
/// assert!(mean(&[]).is_err());
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    StatsError::check_len(values, 1)?;
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`).
#[expect(clippy::cast_precision_loss)]
pub fn population_variance(values: &[f64]) -> Result<f64, StatsError> {
    let mean = mean(values)?;
    Ok(sum_of_squares(values, mean) / values.len() as f64)
}

/// Sample variance (divides by `n - 1`).
///
/// A single observation has no spread to estimate and yields `0.0`.
#[expect(clippy::cast_precision_loss)]
pub fn sample_variance(values: &[f64]) -> Result<f64, StatsError> {
    let mean = mean(values)?;
    if values.len() < 2 {
        return Ok(0.0);
    }
    Ok(sum_of_squares(values, mean) / (values.len() - 1) as f64)
}

/// Sample standard deviation.
pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    sample_variance(values).map(f64::sqrt)
}

/// Standard error of the mean (`s / √n`).
#[expect(clippy::cast_precision_loss)]
pub fn standard_error(values: &[f64]) -> Result<f64, StatsError> {
    let sd = std_dev(values)?;
    Ok(sd / (values.len() as f64).sqrt())
}

pub(crate) fn sum_of_squares(values: &[f64], center: f64) -> f64 {
    values.iter().map(|v| (v - center).powi(2)).sum()
}

/// Descriptive statistics summarizing a dataset.
///
/// This structure contains common measures of central tendency and
/// dispersion for a dataset of `f64` values. Spread measures use the sample
/// (`n - 1`) convention.
#[derive(Debug, Clone, Serialize)]
pub struct DescriptiveStats {
    /// Number of observations.
    pub count: usize,
    /// The minimum value in the dataset.
    pub min: f64,
    /// The maximum value in the dataset.
    pub max: f64,
    /// The arithmetic mean (average) of the dataset.
    pub mean: f64,
    /// The median value of the dataset.
    pub median: f64,
    /// The sample variance of the dataset.
    pub variance: f64,
    /// The sample standard deviation of the dataset.
    pub std_dev: f64,
    /// The standard error of the mean.
    pub standard_error: f64,
}

impl DescriptiveStats {
    /// Computes descriptive statistics from unsorted values.
    ///
    /// This method will sort the values internally before computing statistics.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statlab_stats::descriptive::DescriptiveStats;
    /// let stats = DescriptiveStats::new([5.0, 2.0, 4.0, 1.0, 3.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 5.0);
    /// assert_eq!(stats.mean, 3.0);
    /// assert_eq!(stats.median, 3.0);
    /// ```
    pub fn new<I>(values: I) -> Result<Self, StatsError>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut values = values.into_iter().collect::<Vec<_>>();
        values.sort_by(f64::total_cmp);
        Self::from_sorted(&values)
    }

    /// Computes descriptive statistics from pre-sorted values.
    ///
    /// Non-finite values are rejected with [`StatsError::OutOfRange`].
    ///
    /// # Panics
    ///
    /// Panics if `sorted_values` is not sorted in ascending order.
    pub fn from_sorted(sorted_values: &[f64]) -> Result<Self, StatsError> {
        if let Some(&value) = sorted_values.iter().find(|v| !v.is_finite()) {
            return Err(StatsError::OutOfRange {
                name: "values",
                value,
                expected: "finite values",
            });
        }
        assert!(
            sorted_values.is_sorted_by(|a, b| a <= b),
            "values must be sorted in ascending order"
        );
        StatsError::check_len(sorted_values, 1)?;

        let count = sorted_values.len();
        let min = sorted_values[0];
        let max = sorted_values[count - 1];
        let median = if count % 2 == 0 {
            f64::midpoint(sorted_values[count / 2 - 1], sorted_values[count / 2])
        } else {
            sorted_values[count / 2]
        };
        let variance = sample_variance(sorted_values)?;

        Ok(Self {
            count,
            min,
            max,
            mean: mean(sorted_values)?,
            median,
            variance,
            std_dev: variance.sqrt(),
            standard_error: standard_error(sorted_values)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_rejected() {
        assert_eq!(
            mean(&[]),
            Err(StatsError::InsufficientData {
                required: 1,
                actual: 0
            })
        );
        assert!(DescriptiveStats::new([]).is_err());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                DescriptiveStats::new([1.0, bad, 3.0]),
                Err(StatsError::OutOfRange { name: "values", .. })
            ));
        }
    }

    #[test]
    fn test_variance_conventions() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((population_variance(&values).unwrap() - 4.0).abs() < 1e-12);
        assert!((sample_variance(&values).unwrap() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_value_has_zero_spread() {
        assert_eq!(sample_variance(&[3.0]).unwrap(), 0.0);
        assert_eq!(standard_error(&[3.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_even_count_median() {
        let stats = DescriptiveStats::new([4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.count, 4);
    }

    #[test]
    fn test_standard_error() {
        let values = [1.0, 2.0, 3.0, 4.0];
        let expected = (5.0_f64 / 3.0).sqrt() / 2.0;
        assert!((standard_error(&values).unwrap() - expected).abs() < 1e-12);
    }
}
