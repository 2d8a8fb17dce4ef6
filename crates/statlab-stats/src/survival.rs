//! Kaplan-Meier survival estimation.
//!
//! Records carry an observed time, whether the event happened or the
//! observation was censored, and a group label. The estimator starts at
//! probability `1` at time `0` and steps down only at event times:
//!
//! ```text
//! S(t) = Π (1 - events(tᵢ) / at_risk(tᵢ))   for event times tᵢ ≤ t
//! ```
//!
//! where `at_risk(t)` counts every record with `time ≥ t`, censored or not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::approx;

/// Whether a survival record ended in the event or was censored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum SurvivalStatus {
    Censored,
    Event,
}

impl From<SurvivalStatus> for u8 {
    fn from(status: SurvivalStatus) -> Self {
        match status {
            SurvivalStatus::Censored => 0,
            SurvivalStatus::Event => 1,
        }
    }
}

impl TryFrom<u8> for SurvivalStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Censored),
            1 => Ok(Self::Event),
            _ => Err(format!("survival status must be 0 or 1, got {value}")),
        }
    }
}

/// One time-to-event observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalDataPoint {
    pub time: f64,
    pub status: SurvivalStatus,
    pub group: String,
}

impl SurvivalDataPoint {
    #[must_use]
    pub fn event(time: f64, group: impl Into<String>) -> Self {
        Self {
            time,
            status: SurvivalStatus::Event,
            group: group.into(),
        }
    }

    #[must_use]
    pub fn censored(time: f64, group: impl Into<String>) -> Self {
        Self {
            time,
            status: SurvivalStatus::Censored,
            group: group.into(),
        }
    }

    fn has_valid_time(&self) -> bool {
        self.time.is_finite() && self.time >= 0.0
    }
}

/// One step of a survival curve, as handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalCurvePoint {
    pub time: f64,
    pub survival_probability: f64,
}

/// Kaplan-Meier survival curve.
///
/// The curve stores parallel vectors describing the survival function at each
/// distinct event time:
/// - Time points where events occurred
/// - Survival probability just after each time point
/// - Number of subjects at risk at each time point
/// - Number of events at each time point
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KaplanMeierCurve {
    /// Distinct event times in ascending order.
    pub times: Vec<f64>,
    /// Survival probability at each corresponding time point, non-increasing.
    pub survival_prob: Vec<f64>,
    /// Number of records with `time ≥ t` at each time point.
    pub at_risk: Vec<usize>,
    /// Number of events at each time point.
    pub events: Vec<usize>,
}

impl KaplanMeierCurve {
    /// Computes the Kaplan-Meier curve of `records`, ignoring group labels.
    ///
    /// Records with a negative or non-finite time are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statlab_stats::survival::{KaplanMeierCurve, SurvivalDataPoint};
    /// let records = vec![
    ///     SurvivalDataPoint::event(10.0, "A"),
    ///     SurvivalDataPoint::censored(20.0, "A"),
    ///     SurvivalDataPoint::event(30.0, "A"),
    /// ];
    /// let curve = KaplanMeierCurve::from_records(&records);
    /// assert_eq!(curve.times, vec![10.0, 30.0]);
    /// assert!((curve.survival_prob[0] - 2.0 / 3.0).abs() < 1e-12);
    /// assert_eq!(curve.survival_prob[1], 0.0);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_records(records: &[SurvivalDataPoint]) -> Self {
        let mut data = records
            .iter()
            .filter(|r| r.has_valid_time())
            .map(|r| (r.time, r.status))
            .collect::<Vec<_>>();
        if data.len() < records.len() {
            tracing::warn!(
                skipped = records.len() - data.len(),
                "skipping survival records with negative or non-finite time"
            );
        }
        if data.is_empty() {
            return Self::default();
        }

        data.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut curve = Self::default();
        let mut current_survival = 1.0;
        let total = data.len();

        let mut i = 0;
        while i < data.len() {
            let current_time = data[i].0;
            let at_risk = total - i;

            let mut event_count = 0;
            let mut j = i;
            while j < data.len() && data[j].0 == current_time {
                if data[j].1.is_event() {
                    event_count += 1;
                }
                j += 1;
            }

            if event_count > 0 {
                let survival_rate = 1.0 - (event_count as f64 / at_risk as f64);
                current_survival *= survival_rate;

                curve.times.push(current_time);
                curve.survival_prob.push(current_survival);
                curve.at_risk.push(at_risk);
                curve.events.push(event_count);
            }

            i = j;
        }

        curve
    }

    /// Step points for rendering, starting at `(0, 1)`.
    ///
    /// One point per event time; censoring times never produce a step.
    #[must_use]
    pub fn points(&self) -> Vec<SurvivalCurvePoint> {
        let start = SurvivalCurvePoint {
            time: 0.0,
            survival_probability: 1.0,
        };
        std::iter::once(start)
            .chain(
                self.times
                    .iter()
                    .zip(&self.survival_prob)
                    .map(|(&time, &survival_probability)| SurvivalCurvePoint {
                        time,
                        survival_probability,
                    }),
            )
            .collect()
    }

    /// Returns the median survival time.
    ///
    /// The median survival time is the time at which the survival probability
    /// drops to or below 50%. Linear interpolation is used between event times.
    ///
    /// Returns `None` if the survival probability never reaches 50%.
    #[must_use]
    pub fn median_survival(&self) -> Option<f64> {
        let i = self.survival_prob.iter().position(|&s| s <= 0.5)?;
        if i == 0 {
            return Some(self.times[0]);
        }
        let t0 = self.times[i - 1];
        let t1 = self.times[i];
        let s0 = self.survival_prob[i - 1];
        let s1 = self.survival_prob[i];
        Some(t0 + (0.5 - s0) / (s1 - s0) * (t1 - t0))
    }

    /// Returns the survival probability at `time`.
    ///
    /// Right-continuous step function: the probability drops exactly at an
    /// event time and stays constant until the next one. Returns `1.0` before
    /// the first event.
    ///
    /// # Examples
    ///
    /// ```
    /// # use statlab_stats::survival::{KaplanMeierCurve, SurvivalDataPoint};
    /// let records = vec![SurvivalDataPoint::event(10.0, "A"), SurvivalDataPoint::event(20.0, "A")];
    /// let curve = KaplanMeierCurve::from_records(&records);
    ///
    /// assert_eq!(curve.survival_at(5.0), 1.0);
    /// assert_eq!(curve.survival_at(10.0), 0.5);
    /// assert_eq!(curve.survival_at(15.0), 0.5);
    /// ```
    #[must_use]
    pub fn survival_at(&self, time: f64) -> f64 {
        self.times
            .iter()
            .rposition(|&t| t <= time)
            .map_or(1.0, |i| self.survival_prob[i])
    }
}

/// Kaplan-Meier curves per group label, ordered by label.
#[must_use]
pub fn curves_by_group(records: &[SurvivalDataPoint]) -> BTreeMap<String, KaplanMeierCurve> {
    let mut groups = BTreeMap::<&str, Vec<SurvivalDataPoint>>::new();
    for record in records {
        groups
            .entry(record.group.as_str())
            .or_default()
            .push(record.clone());
    }
    groups
        .into_iter()
        .map(|(group, records)| (group.to_owned(), KaplanMeierCurve::from_records(&records)))
        .collect()
}

/// Log-rank comparison of two groups' survival.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogRankResult {
    pub chi_square: f64,
    pub p_value: f64,
    pub observed_a: usize,
    pub expected_a: f64,
    pub observed_b: usize,
    pub expected_b: f64,
    pub significant: bool,
}

/// Log-rank test between the records labelled `group_a` and `group_b`.
///
/// Records in other groups are ignored. With no events, or no variance, the
/// statistic is `0` and `p_value` is `1`.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn log_rank_test(records: &[SurvivalDataPoint], group_a: &str, group_b: &str) -> LogRankResult {
    let mut data = records
        .iter()
        .filter(|r| r.has_valid_time() && (r.group == group_a || r.group == group_b))
        .map(|r| (r.time, r.status, r.group == group_a))
        .collect::<Vec<_>>();
    data.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut at_risk_a = data.iter().filter(|r| r.2).count();
    let mut at_risk_b = data.len() - at_risk_a;
    let mut observed_a = 0;
    let mut observed_b = 0;
    let mut expected_a = 0.0;
    let mut variance = 0.0;

    let mut i = 0;
    while i < data.len() {
        let current_time = data[i].0;
        let mut j = i;
        let (mut events_a, mut events_b, mut leaving_a, mut leaving_b) = (0, 0, 0, 0);
        while j < data.len() && data[j].0 == current_time {
            let (_, status, in_a) = data[j];
            match (in_a, status.is_event()) {
                (true, true) => events_a += 1,
                (false, true) => events_b += 1,
                _ => {}
            }
            if in_a {
                leaving_a += 1;
            } else {
                leaving_b += 1;
            }
            j += 1;
        }

        let events = events_a + events_b;
        let at_risk = at_risk_a + at_risk_b;
        if events > 0 && at_risk > 0 {
            let (d, n, n_a) = (events as f64, at_risk as f64, at_risk_a as f64);
            expected_a += d * n_a / n;
            if at_risk > 1 {
                variance += d * (n_a / n) * (1.0 - n_a / n) * (n - d) / (n - 1.0);
            }
        }
        observed_a += events_a;
        observed_b += events_b;
        at_risk_a -= leaving_a;
        at_risk_b -= leaving_b;
        i = j;
    }

    let expected_b = (observed_a + observed_b) as f64 - expected_a;
    let chi_square = if variance > f64::EPSILON {
        (observed_a as f64 - expected_a).powi(2) / variance
    } else {
        0.0
    };
    let p_value = approx::chi_square_p_value(chi_square, 1);

    LogRankResult {
        chi_square,
        p_value,
        observed_a,
        expected_a,
        observed_b,
        expected_b,
        significant: p_value < crate::inference::ALPHA,
    }
}
