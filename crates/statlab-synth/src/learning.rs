//! Learner activity: action logs, survey responses and simulated practice.

use rand::Rng;
use serde::{Deserialize, Serialize};
use statlab_models::bkt::{self, BktParams};

use crate::{SynthError, normal::standard_normal};

/// Shape of a set of action logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSequenceParams {
    pub sequences: usize,
    pub length: usize,
    pub actions: Vec<String>,
    /// Probability that an action is followed by the next action in `actions`
    /// (cyclically) instead of a uniformly random one.
    pub follow_probability: f64,
}

impl Default for ActionSequenceParams {
    fn default() -> Self {
        Self {
            sequences: 40,
            length: 12,
            actions: ["watch", "read", "practice", "quiz", "review"]
                .map(str::to_owned)
                .to_vec(),
            follow_probability: 0.6,
        }
    }
}

/// Draws action logs from a first-order Markov chain.
///
/// The first action is uniform. Afterwards each step follows the canonical
/// successor with probability `follow_probability`, so `a → next(a)`
/// transitions are over-represented and show up in pattern mining.
pub fn action_sequences<R>(params: &ActionSequenceParams, rng: &mut R) -> Result<Vec<Vec<String>>, SynthError>
where
    R: Rng + ?Sized,
{
    if params.actions.is_empty() {
        return Err(SynthError::Empty { name: "actions" });
    }
    SynthError::check_probability("follow_probability", params.follow_probability)?;
    let count = params.actions.len();

    let sequences = (0..params.sequences)
        .map(|_| {
            let mut current = rng.random_range(0..count);
            let mut sequence = Vec::with_capacity(params.length);
            for _ in 0..params.length {
                sequence.push(params.actions[current].clone());
                current = if rng.random_bool(params.follow_probability) {
                    (current + 1) % count
                } else {
                    rng.random_range(0..count)
                };
            }
            sequence
        })
        .collect();
    Ok(sequences)
}

/// Shape of a Likert-scale questionnaire with a simple factor structure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurveyParams {
    pub respondents: usize,
    pub factors: usize,
    pub items_per_factor: usize,
    /// Standardized loading of each item on its factor, in `[0, 1]`.
    pub loading: f64,
    /// Number of response categories (e.g. `5` for a 1–5 scale).
    pub scale_points: u8,
}

impl Default for SurveyParams {
    fn default() -> Self {
        Self {
            respondents: 200,
            factors: 2,
            items_per_factor: 4,
            loading: 0.8,
            scale_points: 5,
        }
    }
}

/// Draws questionnaire responses, one row per respondent.
///
/// Every respondent has independent standard normal factor scores. Item `i`
/// of factor `f` is `loading·f + √(1 - loading²)·e`, mapped onto the response
/// scale by rounding and clamping. Items are ordered factor by factor.
pub fn survey_responses<R>(params: &SurveyParams, rng: &mut R) -> Result<Vec<Vec<f64>>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_probability("loading", params.loading)?;
    if params.scale_points < 2 {
        return Err(SynthError::OutOfRange {
            name: "scale_points",
            value: f64::from(params.scale_points),
            expected: "at least 2",
        });
    }
    let unique = (1.0 - params.loading * params.loading).sqrt();
    let top = f64::from(params.scale_points);
    let midpoint = (top + 1.0) / 2.0;
    // ±2 standard deviations span the scale.
    let step = (top - 1.0) / 4.0;

    let rows = (0..params.respondents)
        .map(|_| {
            let scores = (0..params.factors).map(|_| standard_normal(rng)).collect::<Vec<_>>();
            scores
                .iter()
                .flat_map(|&score| std::iter::repeat_n(score, params.items_per_factor))
                .map(|score| {
                    let latent = params.loading * score + unique * standard_normal(rng);
                    (midpoint + latent * step).round().clamp(1.0, top)
                })
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(rows)
}

/// One simulated practice opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedResponse {
    /// Whether the simulated learner actually knew the skill before answering.
    pub knew_skill: bool,
    pub correct: bool,
    /// Tracer estimate after folding in this answer.
    pub mastery: f64,
}

/// Simulates a learner under the BKT generative model and traces the estimate.
///
/// The hidden state starts known with probability `initial_mastery`. Each
/// opportunity answers correctly with probability `1 - slip` (known) or
/// `guess` (unknown), then an unknown skill is learned with probability `learn`.
pub fn simulate_responses<R>(
    params: &BktParams,
    initial_mastery: f64,
    opportunities: usize,
    rng: &mut R,
) -> Result<Vec<SimulatedResponse>, SynthError>
where
    R: Rng + ?Sized,
{
    SynthError::check_probability("initial_mastery", initial_mastery)?;
    let params = BktParams::new(params.learn, params.guess, params.slip)?;

    let mut knows = rng.random_bool(initial_mastery);
    let mut mastery = initial_mastery;
    let responses = (0..opportunities)
        .map(|_| {
            let knew_skill = knows;
            let p_correct = if knew_skill { 1.0 - params.slip } else { params.guess };
            let correct = rng.random_bool(p_correct);
            mastery = bkt::update_mastery(mastery, correct, &params);
            if !knows {
                knows = rng.random_bool(params.learn);
            }
            SimulatedResponse {
                knew_skill,
                correct,
                mastery,
            }
        })
        .collect();
    Ok(responses)
}

#[cfg(test)]
mod tests {
    use statlab_models::{
        factor,
        sequence::{self, MiningParams},
    };

    use super::*;
    use crate::seeded_rng;

    #[test]
    fn test_action_sequences_shape() {
        let mut rng = seeded_rng(1);
        let params = ActionSequenceParams::default();
        let sequences = action_sequences(&params, &mut rng).unwrap();
        assert_eq!(sequences.len(), params.sequences);
        assert!(sequences.iter().all(|s| s.len() == params.length));
        assert!(sequences.iter().flatten().all(|a| params.actions.contains(a)));
    }

    #[test]
    fn test_deterministic_chain_yields_frequent_successor_pattern() {
        let mut rng = seeded_rng(2);
        let params = ActionSequenceParams {
            follow_probability: 1.0,
            ..ActionSequenceParams::default()
        };
        let sequences = action_sequences(&params, &mut rng).unwrap();
        let mining = MiningParams {
            min_support: 0.5,
            max_length: 2,
        };
        let patterns = sequence::mine_patterns(&sequences, &mining).unwrap();
        assert!(
            patterns
                .iter()
                .any(|p| p.pattern.as_slice() == ["watch", "read"])
        );
        assert!(
            !patterns
                .iter()
                .any(|p| p.pattern.as_slice() == ["read", "watch"])
        );
    }

    #[test]
    fn test_survey_has_two_factors() {
        let mut rng = seeded_rng(3);
        let params = SurveyParams::default();
        let rows = survey_responses(&params, &mut rng).unwrap();
        assert_eq!(rows.len(), params.respondents);
        assert!(rows.iter().flatten().all(|&v| (1.0..=5.0).contains(&v) && v.fract() == 0.0));

        let fa = factor::factor_analysis(&rows, None).unwrap();
        assert_eq!(fa.factor_count, 2);
        let first_block = rows.iter().map(|r| r[..4].to_vec()).collect::<Vec<_>>();
        assert!(factor::cronbach_alpha(&first_block).unwrap() > 0.7);
    }

    #[test]
    fn test_simulated_learner_is_eventually_mastered() {
        let mut rng = seeded_rng(4);
        let params = BktParams::new(0.3, 0.2, 0.1).unwrap();
        let responses = simulate_responses(&params, 0.1, 40, &mut rng).unwrap();
        assert_eq!(responses.len(), 40);
        assert!(responses.iter().all(|r| (0.0..=1.0).contains(&r.mastery)));
        assert!(responses.last().unwrap().knew_skill);
        let recent = responses[30..].iter().map(|r| r.mastery).sum::<f64>() / 10.0;
        assert!(recent > 0.9);
    }

    #[test]
    fn test_simulation_rejects_invalid_params() {
        let mut rng = seeded_rng(5);
        let params = BktParams {
            learn: 1.5,
            guess: 0.2,
            slip: 0.1,
        };
        assert!(simulate_responses(&params, 0.1, 5, &mut rng).is_err());
        assert!(simulate_responses(&BktParams::default(), -0.1, 5, &mut rng).is_err());
    }
}
