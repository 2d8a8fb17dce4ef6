//! Principal components and simplified factor analysis.
//!
//! Both analyses work on the correlation matrix of the input variables, so
//! variables on different scales (e.g. survey items on 1–5 and 1–7 scales)
//! contribute equally. Rows are observations and columns are variables.
//!
//! Factor analysis uses principal-component extraction without rotation:
//! loadings are eigenvectors scaled by `√λ`, and the default number of factors
//! follows the Kaiser criterion (eigenvalues greater than 1).

use serde::Serialize;
use statlab_stats::{descriptive, regression};

use crate::ModelError;

/// Sweep limit for the Jacobi eigenvalue iteration.
const MAX_SWEEPS: usize = 100;

/// Off-diagonal mass below which the Jacobi iteration stops.
const JACOBI_TOLERANCE: f64 = 1e-12;

/// Largest `|a[i][j] - a[j][i]|` accepted as symmetric.
const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Eigen decomposition of a symmetric matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Eigen {
    /// Eigenvalues in descending order.
    pub values: Vec<f64>,
    /// `vectors[k]` is the unit eigenvector for `values[k]`, with its
    /// largest-magnitude component made positive.
    pub vectors: Vec<Vec<f64>>,
}

/// Pearson correlation between every pair of columns.
///
/// A column with no variance correlates `0` with everything except itself.
pub fn correlation_matrix<R>(rows: &[R]) -> Result<Vec<Vec<f64>>, ModelError>
where
    R: AsRef<[f64]>,
{
    let columns = columns(rows)?;
    let size = columns.len();
    let mut matrix = vec![vec![0.0; size]; size];
    for i in 0..size {
        matrix[i][i] = 1.0;
        for j in i + 1..size {
            let r = regression::correlation(&columns[i], &columns[j])?;
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    Ok(matrix)
}

/// Eigenvalues and eigenvectors of a symmetric matrix by cyclic Jacobi rotations.
///
/// # Examples
///
/// ```
/// # use statlab_models::factor::symmetric_eigen;
/// let eigen = symmetric_eigen(&[vec![2.0, 1.0], vec![1.0, 2.0]]).unwrap();
/// assert!((eigen.values[0] - 3.0).abs() < 1e-9);
/// assert!((eigen.values[1] - 1.0).abs() < 1e-9);
/// ```
pub fn symmetric_eigen(matrix: &[Vec<f64>]) -> Result<Eigen, ModelError> {
    let n = matrix.len();
    if let Some(row) = matrix.iter().find(|row| row.len() != n) {
        return Err(ModelError::DimensionMismatch {
            expected: n,
            actual: row.len(),
        });
    }
    let asymmetry = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .map(|(i, j)| (matrix[i][j] - matrix[j][i]).abs())
        .fold(0.0, f64::max);
    if asymmetry > SYMMETRY_TOLERANCE {
        return Err(ModelError::OutOfRange {
            name: "asymmetry",
            value: asymmetry,
            expected: "a symmetric matrix",
        });
    }

    let mut a = matrix.to_vec();
    let mut v = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    for sweep in 0..MAX_SWEEPS {
        let off_diagonal = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .map(|(i, j)| a[i][j] * a[i][j])
            .sum::<f64>();
        if off_diagonal < JACOBI_TOLERANCE {
            tracing::trace!(sweep, "Jacobi iteration converged");
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                if a[p][q].abs() < f64::MIN_POSITIVE {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
                let c = 1.0 / t.hypot(1.0);
                let s = t * c;
                for row in &mut a {
                    rotate(&mut row[..], p, q, c, s);
                }
                let (row_p, row_q) = (a[p].clone(), a[q].clone());
                for (k, (x, y)) in row_p.into_iter().zip(row_q).enumerate() {
                    a[p][k] = c * x - s * y;
                    a[q][k] = s * x + c * y;
                }
                for row in &mut v {
                    rotate(&mut row[..], p, q, c, s);
                }
            }
        }
    }

    let mut order = (0..n).collect::<Vec<_>>();
    order.sort_by(|&i, &j| a[j][j].total_cmp(&a[i][i]));
    let values = order.iter().map(|&k| a[k][k]).collect();
    let vectors = order
        .iter()
        .map(|&k| {
            let mut vector = v.iter().map(|row| row[k]).collect::<Vec<_>>();
            let dominant = vector
                .iter()
                .copied()
                .fold(0.0_f64, |m, x| if x.abs() > m.abs() { x } else { m });
            if dominant < 0.0 {
                for x in &mut vector {
                    *x = -*x;
                }
            }
            vector
        })
        .collect();
    Ok(Eigen { values, vectors })
}

/// Applies a Givens rotation to columns `p` and `q` of one row.
fn rotate(row: &mut [f64], p: usize, q: usize, c: f64, s: f64) {
    let (x, y) = (row[p], row[q]);
    row[p] = c * x - s * y;
    row[q] = s * x + c * y;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PcaResult {
    /// All eigenvalues of the correlation matrix, descending.
    pub eigenvalues: Vec<f64>,
    /// Share of total variance explained by each eigenvalue.
    pub explained_variance_ratio: Vec<f64>,
    /// The retained principal axes.
    pub components: Vec<Vec<f64>>,
    /// Standardized observations projected onto the retained components.
    pub scores: Vec<Vec<f64>>,
}

/// Principal component analysis keeping the first `components` axes.
pub fn pca<R>(rows: &[R], components: usize) -> Result<PcaResult, ModelError>
where
    R: AsRef<[f64]>,
{
    let columns = columns(rows)?;
    if components == 0 || components > columns.len() {
        return Err(ModelError::DimensionMismatch {
            expected: columns.len(),
            actual: components,
        });
    }
    let eigen = symmetric_eigen(&correlation_matrix(rows)?)?;
    let total = eigen.values.iter().sum::<f64>();
    let explained_variance_ratio = eigen
        .values
        .iter()
        .map(|value| if total > 0.0 { value / total } else { 0.0 })
        .collect();

    let standardized = standardize(&columns)?;
    let retained = eigen.vectors[..components].to_vec();
    let scores = (0..rows.len())
        .map(|i| {
            retained
                .iter()
                .map(|axis| {
                    axis.iter()
                        .zip(&standardized)
                        .map(|(w, column)| w * column[i])
                        .sum::<f64>()
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Ok(PcaResult {
        eigenvalues: eigen.values,
        explained_variance_ratio,
        components: retained,
        scores,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorAnalysis {
    pub factor_count: usize,
    pub eigenvalues: Vec<f64>,
    /// `loadings[variable][factor]`
    pub loadings: Vec<Vec<f64>>,
    /// Variance of each variable explained by the retained factors.
    pub communalities: Vec<f64>,
    /// Share of total variance explained by the retained factors.
    pub explained_variance: f64,
}

/// Number of eigenvalues greater than 1, but at least one.
#[must_use]
pub fn kaiser_factor_count(eigenvalues: &[f64]) -> usize {
    eigenvalues.iter().filter(|&&value| value > 1.0).count().max(1)
}

/// Principal-component factor extraction.
///
/// With `factors = None` the Kaiser criterion picks the number of factors.
#[expect(clippy::cast_precision_loss)]
pub fn factor_analysis<R>(rows: &[R], factors: Option<usize>) -> Result<FactorAnalysis, ModelError>
where
    R: AsRef<[f64]>,
{
    let eigen = symmetric_eigen(&correlation_matrix(rows)?)?;
    let variables = eigen.values.len();
    let factor_count = factors.unwrap_or_else(|| kaiser_factor_count(&eigen.values));
    if factor_count == 0 || factor_count > variables {
        return Err(ModelError::DimensionMismatch {
            expected: variables,
            actual: factor_count,
        });
    }

    let loadings = (0..variables)
        .map(|variable| {
            (0..factor_count)
                .map(|factor| eigen.vectors[factor][variable] * eigen.values[factor].max(0.0).sqrt())
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let communalities = loadings
        .iter()
        .map(|row| row.iter().map(|l| l * l).sum::<f64>())
        .collect();
    let explained_variance = eigen.values[..factor_count].iter().sum::<f64>() / variables as f64;
    tracing::debug!(factor_count, explained_variance, "factors extracted");

    Ok(FactorAnalysis {
        factor_count,
        eigenvalues: eigen.values,
        loadings,
        communalities,
        explained_variance,
    })
}

/// Internal consistency of a set of scale items (rows are respondents).
///
/// ```text
/// α = k / (k - 1) · (1 - Σ var(itemᵢ) / var(total))
/// ```
///
/// Returns `0` when the total score has no variance.
#[expect(clippy::cast_precision_loss)]
pub fn cronbach_alpha<R>(rows: &[R]) -> Result<f64, ModelError>
where
    R: AsRef<[f64]>,
{
    let columns = columns(rows)?;
    let k = columns.len();
    if k < 2 {
        return Err(ModelError::InsufficientData {
            what: "items",
            required: 2,
            actual: k,
        });
    }
    let item_variance = columns
        .iter()
        .map(|column| descriptive::sample_variance(column))
        .sum::<Result<f64, _>>()?;
    let totals = rows
        .iter()
        .map(|row| row.as_ref().iter().sum())
        .collect::<Vec<f64>>();
    let total_variance = descriptive::sample_variance(&totals)?;
    if total_variance <= 0.0 {
        return Ok(0.0);
    }
    let k = k as f64;
    Ok(k / (k - 1.0) * (1.0 - item_variance / total_variance))
}

/// Transposes validated rows into columns; requires at least two observations.
fn columns<R>(rows: &[R]) -> Result<Vec<Vec<f64>>, ModelError>
where
    R: AsRef<[f64]>,
{
    if rows.len() < 2 {
        return Err(ModelError::InsufficientData {
            what: "observations",
            required: 2,
            actual: rows.len(),
        });
    }
    let width = rows[0].as_ref().len();
    if width == 0 {
        return Err(ModelError::InsufficientData {
            what: "variables",
            required: 1,
            actual: 0,
        });
    }
    if let Some(row) = rows.iter().find(|row| row.as_ref().len() != width) {
        return Err(ModelError::DimensionMismatch {
            expected: width,
            actual: row.as_ref().len(),
        });
    }
    Ok((0..width)
        .map(|j| rows.iter().map(|row| row.as_ref()[j]).collect())
        .collect())
}

fn standardize(columns: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
    columns
        .iter()
        .map(|column| {
            let mean = descriptive::mean(column)?;
            let sd = descriptive::std_dev(column)?;
            Ok(column
                .iter()
                .map(|x| if sd > 0.0 { (x - mean) / sd } else { 0.0 })
                .collect())
        })
        .collect()
}
