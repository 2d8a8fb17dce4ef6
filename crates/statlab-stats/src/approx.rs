//! Teaching-grade numeric approximations.
//!
//! The inferential routines in this crate deliberately use closed-form
//! approximations instead of exact distribution functions. Lesson narratives
//! were written against the shape of these approximations (e.g. the 95% critical
//! value is exactly `1.96`), so they should not be swapped for exact
//! computations without re-checking every dependent threshold.
//!
//! All probability-valued outputs are clamped to `[0, 1]`.

/// 1/√(2π)
const FRAC_1_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Two-sided critical values of the standard normal distribution by confidence level.
///
/// Values between entries are linearly interpolated; values outside the table
/// are clamped to the nearest entry.
const Z_CRITICAL_TABLE: [(f64, f64); 11] = [
    (0.50, 0.674),
    (0.60, 0.842),
    (0.70, 1.036),
    (0.80, 1.282),
    (0.85, 1.440),
    (0.90, 1.645),
    (0.95, 1.960),
    (0.98, 2.326),
    (0.99, 2.576),
    (0.995, 2.807),
    (0.999, 3.291),
];

/// Standard normal probability density φ(x).
#[must_use]
pub fn normal_pdf(x: f64) -> f64 {
    FRAC_1_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Approximation of the standard normal CDF Φ(x).
///
/// Abramowitz & Stegun formula 26.2.17. Maximum absolute error < 7.5 × 10⁻⁸.
///
/// # Examples
///
/// ```
/// use statlab_stats::approx::normal_cdf;
/// assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
/// assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
/// ```
#[must_use]
pub fn normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    if x == f64::INFINITY {
        return 1.0;
    }
    if x == f64::NEG_INFINITY {
        return 0.0;
    }

    let abs_x = x.abs();
    let k = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let poly = k
        * (0.319_381_530
            + k * (-0.356_563_782 + k * (1.781_477_937 + k * (-1.821_255_978 + k * 1.330_274_429))));
    let upper = (normal_pdf(abs_x) * poly).clamp(0.0, 1.0);

    if x >= 0.0 { 1.0 - upper } else { upper }
}

/// Approximation of the inverse standard normal CDF.
///
/// Abramowitz & Stegun formula 26.2.23 (rational approximation).
/// Maximum absolute error < 4.5 × 10⁻⁴.
///
/// # Returns
///
/// - `f64::NEG_INFINITY` if `p <= 0`
/// - `f64::INFINITY` if `p >= 1`
/// - `f64::NAN` if `p` is NaN
///
/// # Examples
///
/// ```
/// use statlab_stats::approx::inverse_normal_cdf;
/// assert!((inverse_normal_cdf(0.975) - 1.96).abs() < 1e-3);
/// assert_eq!(inverse_normal_cdf(0.5), 0.0);
/// ```
#[must_use]
pub fn inverse_normal_cdf(p: f64) -> f64 {
    if p.is_nan() {
        return f64::NAN;
    }
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if (p - 0.5).abs() < f64::EPSILON {
        return 0.0;
    }

    let (q, sign) = if p < 0.5 { (p, -1.0) } else { (1.0 - p, 1.0) };
    let t = (-2.0 * q.ln()).sqrt();
    let numerator = 2.515_517 + t * (0.802_853 + t * 0.010_328);
    let denominator = 1.0 + t * (1.432_788 + t * (0.189_269 + t * 0.001_308));
    sign * (t - numerator / denominator)
}

/// Two-sided critical z value for a confidence level in `(0, 1)`.
///
/// Uses a lookup table with linear interpolation rather than the exact
/// quantile, so common levels reproduce the textbook values (0.95 → 1.96).
///
/// # Examples
///
/// ```
/// use statlab_stats::approx::z_critical;
/// assert_eq!(z_critical(0.95), 1.96);
/// assert_eq!(z_critical(0.99), 2.576);
/// ```
#[must_use]
pub fn z_critical(confidence_level: f64) -> f64 {
    let (first_level, first_z) = Z_CRITICAL_TABLE[0];
    let (last_level, last_z) = Z_CRITICAL_TABLE[Z_CRITICAL_TABLE.len() - 1];
    if confidence_level.is_nan() || confidence_level <= first_level {
        return first_z;
    }
    if confidence_level >= last_level {
        return last_z;
    }

    for window in Z_CRITICAL_TABLE.windows(2) {
        let (lo_level, lo_z) = window[0];
        let (hi_level, hi_z) = window[1];
        if (confidence_level - hi_level).abs() < 1e-12 {
            return hi_z;
        }
        if confidence_level < hi_level {
            let t = (confidence_level - lo_level) / (hi_level - lo_level);
            return lo_z + t * (hi_z - lo_z);
        }
    }
    last_z
}

/// Two-tailed p-value of a z statistic under the normal approximation.
#[must_use]
pub fn two_tailed_p_value(z: f64) -> f64 {
    if z.is_nan() {
        return 1.0;
    }
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// Approximate upper-tail probability of the chi-square distribution.
///
/// Wilson-Hilferty cube-root transformation to a standard normal. The result
/// is monotonically non-increasing in `chi_square` but only accurate to about
/// two decimal places for small `degrees_of_freedom`.
///
/// Returns `1.0` for non-positive statistics or zero degrees of freedom.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn chi_square_p_value(chi_square: f64, degrees_of_freedom: usize) -> f64 {
    if degrees_of_freedom == 0 || chi_square.is_nan() || chi_square <= 0.0 {
        return 1.0;
    }
    let k = degrees_of_freedom as f64;
    let variance = 2.0 / (9.0 * k);
    let z = ((chi_square / k).cbrt() - (1.0 - variance)) / variance.sqrt();
    (1.0 - normal_cdf(z)).clamp(0.0, 1.0)
}

/// Approximate upper-tail probability of the F distribution.
///
/// Paulson's normal approximation. Returns `1.0` for non-positive statistics
/// or zero degrees of freedom.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn f_p_value(f: f64, df_numerator: usize, df_denominator: usize) -> f64 {
    if df_numerator == 0 || df_denominator == 0 || f.is_nan() || f <= 0.0 {
        return 1.0;
    }
    let a = 2.0 / (9.0 * df_numerator as f64);
    let b = 2.0 / (9.0 * df_denominator as f64);
    let cube_root = f.cbrt();
    let z = ((1.0 - b) * cube_root - (1.0 - a)) / (a + cube_root * cube_root * b).sqrt();
    (1.0 - normal_cdf(z)).clamp(0.0, 1.0)
}
