//! Grouped designs: multilevel data, time-to-event records and
//! treated/control populations.

use rand::Rng;
use rand_distr::Exp;
use serde::{Deserialize, Serialize};
use statlab_models::matching::{Group, PSMDataPoint};
use statlab_stats::survival::SurvivalDataPoint;

use crate::{
    SynthError,
    normal::{normal_samples, standard_normal},
};

/// Shape of a two-level (observations within groups) dataset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalParams {
    pub groups: usize,
    pub per_group: usize,
    pub grand_mean: f64,
    /// Standard deviation of the per-group random effect.
    pub group_std_dev: f64,
    /// Standard deviation of the per-observation error.
    pub residual_std_dev: f64,
}

impl Default for HierarchicalParams {
    fn default() -> Self {
        Self {
            groups: 4,
            per_group: 25,
            grand_mean: 70.0,
            group_std_dev: 5.0,
            residual_std_dev: 10.0,
        }
    }
}

/// One observation in a grouped design.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupedObservation {
    pub group: usize,
    pub value: f64,
}

/// Draws a random-intercept dataset.
///
/// Each group draws one offset `uⱼ ~ N(0, group_std_dev²)`; each observation
/// adds independent error `eᵢⱼ ~ N(0, residual_std_dev²)`:
///
/// ```text
/// yᵢⱼ = grand_mean + uⱼ + eᵢⱼ
/// ```
pub fn hierarchical<R>(params: &HierarchicalParams, rng: &mut R) -> Result<Vec<GroupedObservation>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_std_dev("group_std_dev", params.group_std_dev)?;
    SynthError::check_std_dev("residual_std_dev", params.residual_std_dev)?;

    let mut observations = Vec::with_capacity(params.groups * params.per_group);
    for group in 0..params.groups {
        let offset = params.group_std_dev * standard_normal(rng);
        let values = normal_samples(
            params.grand_mean + offset,
            params.residual_std_dev,
            params.per_group,
            rng,
        )?;
        observations.extend(values.into_iter().map(|value| GroupedObservation { group, value }));
    }
    Ok(observations)
}

/// Splits grouped observations into one value list per group, ordered by group index.
#[must_use]
pub fn group_values(observations: &[GroupedObservation]) -> Vec<Vec<f64>> {
    let groups = observations.iter().map(|o| o.group + 1).max().unwrap_or(0);
    let mut values = vec![Vec::new(); groups];
    for observation in observations {
        values[observation.group].push(observation.value);
    }
    values
}

/// Hazard of one survival group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupHazard {
    pub name: String,
    /// Events per unit time; the mean event time is `1 / hazard_rate`.
    pub hazard_rate: f64,
}

/// Shape of a time-to-event dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalParams {
    pub per_group: usize,
    pub groups: Vec<GroupHazard>,
    /// Rate of random drop-out; `0` disables drop-out censoring.
    pub censoring_rate: f64,
    /// End of follow-up; anything still running is censored here.
    pub max_time: f64,
}

impl Default for SurvivalParams {
    fn default() -> Self {
        Self {
            per_group: 50,
            groups: vec![
                GroupHazard {
                    name: "control".to_owned(),
                    hazard_rate: 0.15,
                },
                GroupHazard {
                    name: "intervention".to_owned(),
                    hazard_rate: 0.08,
                },
            ],
            censoring_rate: 0.03,
            max_time: 24.0,
        }
    }
}

/// Draws exponential event times with independent exponential drop-out.
///
/// The observed time is the earliest of event, drop-out and `max_time`; the
/// record is an event only if the event came first.
pub fn survival_records<R>(params: &SurvivalParams, rng: &mut R) -> Result<Vec<SurvivalDataPoint>, SynthError>
where
    R: Rng + ?Sized,
{
    if params.groups.is_empty() {
        return Err(SynthError::Empty { name: "groups" });
    }
    SynthError::check_positive("max_time", params.max_time)?;
    SynthError::check_std_dev("censoring_rate", params.censoring_rate)?;
    let dropout = if params.censoring_rate > 0.0 {
        Some(exponential(params.censoring_rate)?)
    } else {
        None
    };

    let mut records = Vec::with_capacity(params.groups.len() * params.per_group);
    for group in &params.groups {
        let events = exponential(SynthError::check_positive("hazard_rate", group.hazard_rate)?)?;
        for _ in 0..params.per_group {
            let event_time = rng.sample(events);
            let censor_time = dropout
                .map_or(params.max_time, |d| rng.sample(d))
                .min(params.max_time);
            records.push(if event_time <= censor_time {
                SurvivalDataPoint::event(event_time, group.name.as_str())
            } else {
                SurvivalDataPoint::censored(censor_time, group.name.as_str())
            });
        }
    }
    tracing::debug!(
        records = records.len(),
        events = records.iter().filter(|r| r.status.is_event()).count(),
        "survival records generated"
    );
    Ok(records)
}

fn exponential(rate: f64) -> Result<Exp<f64>, SynthError> {
    Exp::new(rate).map_err(|_| SynthError::OutOfRange {
        name: "rate",
        value: rate,
        expected: "(0, ∞)",
    })
}

/// Shape of an observational study population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PsmPopulationParams {
    pub treated: usize,
    pub control: usize,
    pub score_mean: f64,
    pub score_std_dev: f64,
    /// How far the treated group's prior scores are shifted upward.
    pub selection_bias: f64,
}

impl Default for PsmPopulationParams {
    fn default() -> Self {
        Self {
            treated: 30,
            control: 60,
            score_mean: 65.0,
            score_std_dev: 10.0,
            selection_bias: 8.0,
        }
    }
}

/// Draws an unmatched population where treatment is selected on prior score.
///
/// Treated units get ids `0..treated`, controls follow.
pub fn psm_population<R>(params: &PsmPopulationParams, rng: &mut R) -> Result<Vec<PSMDataPoint>, SynthError>
where
    R: Rng + ?Sized,
{
    let treated = normal_samples(
        params.score_mean + params.selection_bias,
        params.score_std_dev,
        params.treated,
        rng,
    )?;
    let control = normal_samples(params.score_mean, params.score_std_dev, params.control, rng)?;
    let population = treated
        .into_iter()
        .map(|score| (Group::Treatment, score))
        .chain(control.into_iter().map(|score| (Group::Control, score)))
        .zip(0..)
        .map(|((group, score), id)| PSMDataPoint::new(id, group, score))
        .collect();
    Ok(population)
}
