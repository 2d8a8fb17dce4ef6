//! Additive feature attribution for linear models.
//!
//! For a linear model the exact Shapley value of feature `j` at row `x`,
//! relative to a background of the training rows, is
//!
//! ```text
//! φⱼ = βⱼ · (xⱼ - mean(xⱼ))
//! ```
//!
//! so an explanation always adds up: `base_value + Σ φⱼ = prediction`, where
//! `base_value` is the model's prediction at the background mean.

use serde::{Deserialize, Serialize};
use statlab_stats::StatsError;

use crate::ModelError;

/// Relative pivot size below which the normal equations count as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// A least-squares linear model `y = intercept + Σ βⱼ xⱼ`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Per-feature mean of the training rows; the reference point for explanations.
    pub background_mean: Vec<f64>,
}

/// Per-feature decomposition of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub base_value: f64,
    pub contributions: Vec<f64>,
    pub prediction: f64,
}

impl LinearModel {
    /// Fits the model by solving the normal equations `XᵀX β = Xᵀy`.
    ///
    /// A singular system (e.g. a constant or duplicated feature) falls back to
    /// the intercept-only model `y = mean(y)`.
    #[expect(clippy::cast_precision_loss)]
    pub fn fit<R>(rows: &[R], targets: &[f64]) -> Result<Self, ModelError>
    where
        R: AsRef<[f64]>,
    {
        let features = feature_count(rows)?;
        if targets.len() != rows.len() {
            return Err(StatsError::LengthMismatch {
                left: "rows",
                left_len: rows.len(),
                right: "targets",
                right_len: targets.len(),
            }
            .into());
        }

        let n = rows.len() as f64;
        let background_mean = (0..features)
            .map(|j| rows.iter().map(|row| row.as_ref()[j]).sum::<f64>() / n)
            .collect::<Vec<_>>();

        // Augmented design: column 0 is the intercept.
        let size = features + 1;
        let mut xtx = vec![vec![0.0; size]; size];
        let mut xty = vec![0.0; size];
        for (row, &y) in rows.iter().zip(targets) {
            let design = std::iter::once(1.0)
                .chain(row.as_ref().iter().copied())
                .collect::<Vec<_>>();
            for (i, &xi) in design.iter().enumerate() {
                xty[i] += xi * y;
                for (j, &xj) in design.iter().enumerate() {
                    xtx[i][j] += xi * xj;
                }
            }
        }

        if let Some(beta) = solve(xtx, xty) {
            Ok(Self {
                intercept: beta[0],
                coefficients: beta[1..].to_vec(),
                background_mean,
            })
        } else {
            tracing::warn!(features, "singular design; falling back to intercept-only model");
            Ok(Self {
                intercept: targets.iter().sum::<f64>() / n,
                coefficients: vec![0.0; features],
                background_mean,
            })
        }
    }

    pub fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        self.check_row(row)?;
        Ok(self.intercept
            + self
                .coefficients
                .iter()
                .zip(row)
                .map(|(beta, x)| beta * x)
                .sum::<f64>())
    }

    /// Splits the prediction for `row` into per-feature contributions.
    pub fn explain(&self, row: &[f64]) -> Result<Explanation, ModelError> {
        let prediction = self.predict(row)?;
        let base_value = self.predict(&self.background_mean)?;
        let contributions = self
            .coefficients
            .iter()
            .zip(row.iter().zip(&self.background_mean))
            .map(|(beta, (x, mean))| beta * (x - mean))
            .collect();
        Ok(Explanation {
            base_value,
            contributions,
            prediction,
        })
    }

    /// Mean absolute contribution of each feature over `rows`.
    #[expect(clippy::cast_precision_loss)]
    pub fn global_importance<R>(&self, rows: &[R]) -> Result<Vec<f64>, ModelError>
    where
        R: AsRef<[f64]>,
    {
        let mut totals = vec![0.0; self.coefficients.len()];
        for row in rows {
            let explanation = self.explain(row.as_ref())?;
            for (total, contribution) in totals.iter_mut().zip(explanation.contributions) {
                *total += contribution.abs();
            }
        }
        if !rows.is_empty() {
            let n = rows.len() as f64;
            for total in &mut totals {
                *total /= n;
            }
        }
        Ok(totals)
    }

    fn check_row(&self, row: &[f64]) -> Result<(), ModelError> {
        if row.len() == self.coefficients.len() {
            Ok(())
        } else {
            Err(ModelError::DimensionMismatch {
                expected: self.coefficients.len(),
                actual: row.len(),
            })
        }
    }
}

fn feature_count<R>(rows: &[R]) -> Result<usize, ModelError>
where
    R: AsRef<[f64]>,
{
    let first = rows.first().ok_or(ModelError::InsufficientData {
        what: "rows",
        required: 1,
        actual: 0,
    })?;
    let features = first.as_ref().len();
    if let Some(row) = rows.iter().find(|row| row.as_ref().len() != features) {
        return Err(ModelError::DimensionMismatch {
            expected: features,
            actual: row.as_ref().len(),
        });
    }
    Ok(features)
}

/// Solves `a · x = b` by Gaussian elimination with partial pivoting.
///
/// Returns `None` when the matrix is (numerically) singular.
fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let size = b.len();
    let scale = a
        .iter()
        .flatten()
        .fold(0.0_f64, |max, value| max.max(value.abs()))
        .max(1.0);

    for col in 0..size {
        let pivot = (col..size).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() <= SINGULAR_TOLERANCE * scale {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        let (upper, lower) = a.split_at_mut(col + 1);
        let pivot_row = &upper[col];
        for (offset, row) in lower.iter_mut().enumerate() {
            let factor = row[col] / pivot_row[col];
            if factor == 0.0 {
                continue;
            }
            for (value, pivot_value) in row[col..].iter_mut().zip(&pivot_row[col..]) {
                *value -= factor * pivot_value;
            }
            b[col + 1 + offset] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; size];
    for row in (0..size).rev() {
        let tail = (row + 1..size).map(|k| a[row][k] * x[k]).sum::<f64>();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_data() -> (Vec<[f64; 2]>, Vec<f64>) {
        let rows = vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [2.0, 1.0],
            [3.0, 5.0],
            [4.0, 2.0],
        ];
        let targets = rows.iter().map(|[a, b]| 1.0 + 2.0 * a - 3.0 * b).collect();
        (rows, targets)
    }

    #[test]
    fn test_fit_recovers_coefficients() {
        let (rows, targets) = linear_data();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!((model.intercept - 1.0).abs() < 1e-9);
        assert!((model.coefficients[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients[1] + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_explanation_is_additive() {
        let (rows, targets) = linear_data();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        for row in &rows {
            let explanation = model.explain(row).unwrap();
            let total = explanation.base_value + explanation.contributions.iter().sum::<f64>();
            assert!((total - explanation.prediction).abs() < 1e-9);
        }
    }

    #[test]
    fn test_background_row_has_zero_contributions() {
        let (rows, targets) = linear_data();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        let explanation = model.explain(&model.background_mean).unwrap();
        assert!(explanation.contributions.iter().all(|c| c.abs() < 1e-12));
    }

    #[test]
    fn test_singular_design_falls_back_to_intercept() {
        let rows = vec![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let targets = [1.0, 2.0, 6.0];
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert_eq!(model.coefficients, vec![0.0, 0.0]);
        assert!((model.intercept - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_global_importance_ranks_features() {
        let (rows, targets) = linear_data();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        let importance = model.global_importance(&rows).unwrap();
        assert_eq!(importance.len(), 2);
        assert!(importance[1] > importance[0]);
    }

    #[test]
    fn test_rejects_malformed_input() {
        let ragged: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![1.0]];
        assert_eq!(
            LinearModel::fit(&ragged, &[1.0, 2.0]),
            Err(ModelError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
        let empty: [[f64; 1]; 0] = [];
        assert!(LinearModel::fit(&empty, &[]).is_err());
        let (rows, _) = linear_data();
        assert!(LinearModel::fit(&rows, &[1.0]).is_err());

        let (rows, targets) = linear_data();
        let model = LinearModel::fit(&rows, &targets).unwrap();
        assert!(model.predict(&[1.0]).is_err());
    }
}
