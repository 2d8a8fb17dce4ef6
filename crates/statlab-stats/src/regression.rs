//! Least-squares regression and correlation over 2D points.
//!
//! Regression is closed-form OLS. When the design is singular (no spread in
//! `x`, e.g. a single unique x value), the fitted line falls back to a
//! horizontal line through the mean of `y` instead of dividing by zero. The
//! fallback is reported by [`fit_line_with_diagnostics`] so callers can flag
//! the result as low confidence.

use serde::{Deserialize, Serialize};

use crate::StatsError;

/// A 2D observation.
///
/// `id` stays stable while a point is dragged around so it can be updated
/// individually; it must be unique within a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: u32,
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(id: u32, x: f64, y: f64) -> Self {
        Self { id, x, y }
    }
}

/// A fitted line `y = slope · x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionLine {
    pub slope: f64,
    pub intercept: f64,
}

impl RegressionLine {
    /// Fits the ordinary least squares line through `points`.
    ///
    /// Falls back to `slope = 0`, `intercept = mean(y)` when the x values have
    /// no spread (and to the zero line for an empty set).
    ///
    /// # Examples
    ///
    /// ```
    /// # use statlab_stats::regression::{Point, RegressionLine};
    /// let vertical = [Point::new(0, 1.0, 2.0), Point::new(1, 1.0, 4.0)];
    /// let line = RegressionLine::fit(&vertical);
    /// assert_eq!(line.slope, 0.0);
    /// assert_eq!(line.intercept, 3.0);
    /// ```
    #[must_use]
    pub fn fit(points: &[Point]) -> Self {
        fit_line_with_diagnostics(points).line
    }

    /// Evaluates the line at `x`.
    #[must_use]
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// A fitted line together with whether the fallback rule was applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LineFit {
    pub line: RegressionLine,
    /// `true` when the design was singular and the horizontal fallback line was returned.
    pub degenerate: bool,
}

/// Fits an OLS line and reports whether the singular-design fallback was used.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn fit_line_with_diagnostics(points: &[Point]) -> LineFit {
    if points.is_empty() {
        return LineFit {
            line: RegressionLine {
                slope: 0.0,
                intercept: 0.0,
            },
            degenerate: true,
        };
    }

    let n = points.len() as f64;
    let (sum_x, sum_y, sum_xy, sum_x2) =
        points
            .iter()
            .fold((0.0, 0.0, 0.0, 0.0), |(sx, sy, sxy, sx2), p| {
                (sx + p.x, sy + p.y, sxy + p.x * p.y, sx2 + p.x * p.x)
            });

    let determinant = n * sum_x2 - sum_x * sum_x;
    // Relative tolerance: identical x values can leave rounding residue in the determinant.
    if determinant.abs() <= f64::EPSILON * n * sum_x2.abs().max(1.0) {
        return LineFit {
            line: RegressionLine {
                slope: 0.0,
                intercept: sum_y / n,
            },
            degenerate: true,
        };
    }

    let slope = (n * sum_xy - sum_x * sum_y) / determinant;
    let intercept = (sum_y - slope * sum_x) / n;
    LineFit {
        line: RegressionLine { slope, intercept },
        degenerate: false,
    }
}

/// Residuals `y - ŷ` of each point against `line`, in input order.
#[must_use]
pub fn residuals(points: &[Point], line: &RegressionLine) -> Vec<f64> {
    points.iter().map(|p| p.y - line.predict(p.x)).collect()
}

/// Coefficient of determination of `line` over `points`.
///
/// Returns `1.0` ("insufficient data") for fewer than two points. For the OLS
/// line the result lies in `[0, 1]`; arbitrary lines can score below zero.
/// When `y` has no spread the result is `1.0` for an exact fit and `0.0`
/// otherwise.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn r_squared(points: &[Point], line: &RegressionLine) -> f64 {
    if points.len() < 2 {
        return 1.0;
    }
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / points.len() as f64;
    let ss_total = points.iter().map(|p| (p.y - mean_y).powi(2)).sum::<f64>();
    let ss_residual = residuals(points, line)
        .iter()
        .map(|r| r * r)
        .sum::<f64>();

    if ss_total <= f64::EPSILON {
        return if ss_residual <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_residual / ss_total
}

/// Standard error of the estimate, `√(SS_res / (n - 2))`.
///
/// Returns `0.0` ("insufficient data") for two or fewer points.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn standard_error_of_estimate(points: &[Point], line: &RegressionLine) -> f64 {
    if points.len() <= 2 {
        return 0.0;
    }
    let ss_residual = residuals(points, line)
        .iter()
        .map(|r| r * r)
        .sum::<f64>();
    (ss_residual / (points.len() - 2) as f64).sqrt()
}

/// Pearson correlation coefficient between two equally long series.
///
/// Symmetric in its arguments. Returns `0.0` when either series has no spread.
///
/// # Examples
///
/// ```
/// # use statlab_stats::regression::correlation;
/// let x = [1.0, 2.0, 3.0, 4.0];
/// let y = [2.0, 4.0, 6.0, 8.0];
/// assert!((correlation(&x, &y).unwrap() - 1.0).abs() < 1e-12);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn correlation(xs: &[f64], ys: &[f64]) -> Result<f64, StatsError> {
    if xs.len() != ys.len() {
        return Err(StatsError::LengthMismatch {
            left: "x",
            left_len: xs.len(),
            right: "y",
            right_len: ys.len(),
        });
    }
    StatsError::check_len(xs, 1)?;

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;
    let mut s_xy = 0.0;
    let mut s_xx = 0.0;
    let mut s_yy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        s_xy += dx * dy;
        s_xx += dx * dx;
        s_yy += dy * dy;
    }

    let denominator = (s_xx * s_yy).sqrt();
    if denominator <= f64::EPSILON {
        return Ok(0.0);
    }
    Ok((s_xy / denominator).clamp(-1.0, 1.0))
}

/// Pearson correlation between the `x` and `y` coordinates of `points`.
///
/// Returns `0.0` for an empty set.
#[must_use]
pub fn point_correlation(points: &[Point]) -> f64 {
    let xs = points.iter().map(|p| p.x).collect::<Vec<_>>();
    let ys = points.iter().map(|p| p.y).collect::<Vec<_>>();
    correlation(&xs, &ys).unwrap_or(0.0)
}

/// Everything a scatter-plot lesson shows about its current point set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionSummary {
    pub line: RegressionLine,
    pub r_squared: f64,
    pub standard_error: f64,
    pub correlation: f64,
    pub count: usize,
    pub degenerate: bool,
}

impl RegressionSummary {
    #[must_use]
    pub fn from_points(points: &[Point]) -> Self {
        let LineFit { line, degenerate } = fit_line_with_diagnostics(points);
        Self {
            line,
            r_squared: r_squared(points, &line),
            standard_error: standard_error_of_estimate(points, &line),
            correlation: point_correlation(points),
            count: points.len(),
            degenerate,
        }
    }
}
