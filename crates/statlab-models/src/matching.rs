//! Greedy nearest-neighbor propensity-score matching.
//!
//! Treated units are visited in random order so low ids get no systematic
//! advantage. Each one takes the closest still-unused control whose score lies
//! within the caliper; if there is none it stays unmatched. Pairs are
//! one-to-one and symmetric.
//!
//! Greedy matching does not minimize the total pair distance. The optimal
//! one-to-one assignment is a different (and much more expensive) problem.

use std::collections::{HashMap, HashSet};

use rand::{Rng, seq::SliceRandom as _};
use serde::{Deserialize, Serialize};
use statlab_stats::descriptive;

use crate::ModelError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum Group {
    Treatment,
    Control,
}

/// A unit eligible for matching.
///
/// If `matched_with_id` is `Some(x)`, the record with id `x` points back at
/// this one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PSMDataPoint {
    pub id: u32,
    pub group: Group,
    pub prior_score: f64,
    pub is_matched: bool,
    pub matched_with_id: Option<u32>,
}

impl PSMDataPoint {
    #[must_use]
    pub const fn new(id: u32, group: Group, prior_score: f64) -> Self {
        Self {
            id,
            group,
            prior_score,
            is_matched: false,
            matched_with_id: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingParams {
    /// Largest score distance accepted for a pair.
    pub caliper: f64,
}

impl Default for MatchingParams {
    fn default() -> Self {
        Self { caliper: 5.0 }
    }
}

/// Matches treated units to controls.
///
/// Any matching already present on the input is discarded. The output keeps
/// the input order.
pub fn match_greedy<R>(
    points: &[PSMDataPoint],
    params: &MatchingParams,
    rng: &mut R,
) -> Result<Vec<PSMDataPoint>, ModelError>
where
    R: Rng + ?Sized,
{
    ModelError::check_non_negative("caliper", params.caliper)?;
    let mut seen = HashSet::with_capacity(points.len());
    if let Some(point) = points.iter().find(|p| !seen.insert(p.id)) {
        return Err(ModelError::DuplicateId { id: point.id });
    }

    let mut matched = points
        .iter()
        .map(|p| PSMDataPoint::new(p.id, p.group, p.prior_score))
        .collect::<Vec<_>>();

    let mut treated = (0..matched.len())
        .filter(|&i| matched[i].group.is_treatment())
        .collect::<Vec<_>>();
    treated.shuffle(rng);

    for t in treated {
        let score = matched[t].prior_score;
        let best = matched
            .iter()
            .enumerate()
            .filter(|(_, c)| c.group.is_control() && !c.is_matched)
            .map(|(i, c)| (i, (c.prior_score - score).abs()))
            .filter(|&(_, distance)| distance <= params.caliper)
            .fold(None, |best: Option<(usize, f64)>, candidate| match best {
                Some((_, d)) if d <= candidate.1 => best,
                _ => Some(candidate),
            });
        if let Some((c, distance)) = best {
            tracing::trace!(treated = matched[t].id, control = matched[c].id, distance, "matched pair");
            let (treated_id, control_id) = (matched[t].id, matched[c].id);
            matched[t].is_matched = true;
            matched[t].matched_with_id = Some(control_id);
            matched[c].is_matched = true;
            matched[c].matched_with_id = Some(treated_id);
        }
    }

    tracing::debug!(
        pairs = matched.iter().filter(|p| p.group.is_treatment() && p.is_matched).count(),
        caliper = params.caliper,
        "greedy matching finished"
    );
    Ok(matched)
}

/// Checks that every match references a record of the other group that points back.
#[must_use]
pub fn is_symmetric(points: &[PSMDataPoint]) -> bool {
    let by_id = points.iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
    points.iter().all(|p| match p.matched_with_id {
        None => !p.is_matched,
        Some(partner) => {
            p.is_matched
                && by_id.get(&partner).is_some_and(|q| {
                    q.is_matched && q.matched_with_id == Some(p.id) && q.group != p.group
                })
        }
    })
}

/// Mean prior score of each group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBalance {
    pub treated_mean: f64,
    pub control_mean: f64,
    pub difference: f64,
}

impl ScoreBalance {
    fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a PSMDataPoint>,
    {
        let (treated, control): (Vec<_>, Vec<_>) =
            points.into_iter().partition(|p| p.group.is_treatment());
        let group_mean = |group: &[&PSMDataPoint]| {
            descriptive::mean(&group.iter().map(|p| p.prior_score).collect::<Vec<_>>())
                .unwrap_or(0.0)
        };
        let treated_mean = group_mean(&treated);
        let control_mean = group_mean(&control);
        Self {
            treated_mean,
            control_mean,
            difference: treated_mean - control_mean,
        }
    }
}

/// Outcome of a matching run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchingSummary {
    pub pairs: usize,
    pub treated: usize,
    pub unmatched_treated: usize,
    /// Mean absolute score distance within pairs; `0` when nothing matched.
    pub mean_pair_distance: f64,
    pub balance_before: ScoreBalance,
    pub balance_after: ScoreBalance,
}

impl MatchingSummary {
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn from_points(points: &[PSMDataPoint]) -> Self {
        let by_id = points.iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
        let treated = points.iter().filter(|p| p.group.is_treatment()).collect::<Vec<_>>();
        let distances = treated
            .iter()
            .filter_map(|t| {
                let partner = by_id.get(&t.matched_with_id?)?;
                Some((t.prior_score - partner.prior_score).abs())
            })
            .collect::<Vec<_>>();
        let pairs = distances.len();
        let mean_pair_distance = if pairs == 0 {
            0.0
        } else {
            distances.iter().sum::<f64>() / pairs as f64
        };
        Self {
            pairs,
            treated: treated.len(),
            unmatched_treated: treated.len() - pairs,
            mean_pair_distance,
            balance_before: ScoreBalance::from_points(points),
            balance_after: ScoreBalance::from_points(points.iter().filter(|p| p.is_matched)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn population() -> Vec<PSMDataPoint> {
        vec![
            PSMDataPoint::new(1, Group::Treatment, 70.0),
            PSMDataPoint::new(2, Group::Treatment, 80.0),
            PSMDataPoint::new(3, Group::Treatment, 95.0),
            PSMDataPoint::new(4, Group::Control, 68.0),
            PSMDataPoint::new(5, Group::Control, 79.0),
            PSMDataPoint::new(6, Group::Control, 50.0),
        ]
    }

    #[test]
    fn test_matches_are_symmetric_and_within_caliper() {
        let mut rng = Pcg32::seed_from_u64(1);
        let params = MatchingParams { caliper: 5.0 };
        let matched = match_greedy(&population(), &params, &mut rng).unwrap();
        assert!(is_symmetric(&matched));

        let partner = |id: u32| matched.iter().find(|p| p.id == id).unwrap().matched_with_id;
        assert_eq!(partner(1), Some(4));
        assert_eq!(partner(2), Some(5));
        assert_eq!(partner(3), None);
        assert_eq!(partner(6), None);
    }

    #[test]
    fn test_controls_are_used_once() {
        let points = vec![
            PSMDataPoint::new(1, Group::Treatment, 50.0),
            PSMDataPoint::new(2, Group::Treatment, 50.5),
            PSMDataPoint::new(3, Group::Control, 50.2),
        ];
        for seed in 0..10 {
            let mut rng = Pcg32::seed_from_u64(seed);
            let matched = match_greedy(&points, &MatchingParams::default(), &mut rng).unwrap();
            assert!(is_symmetric(&matched));
            let summary = MatchingSummary::from_points(&matched);
            assert_eq!(summary.pairs, 1);
            assert_eq!(summary.unmatched_treated, 1);
        }
    }

    #[test]
    fn test_treated_order_is_randomized() {
        let points = vec![
            PSMDataPoint::new(1, Group::Treatment, 50.0),
            PSMDataPoint::new(2, Group::Treatment, 50.5),
            PSMDataPoint::new(3, Group::Control, 50.2),
        ];
        let winners = (0..20)
            .map(|seed| {
                let mut rng = Pcg32::seed_from_u64(seed);
                let matched = match_greedy(&points, &MatchingParams::default(), &mut rng).unwrap();
                matched.iter().find(|p| p.id == 3).unwrap().matched_with_id
            })
            .collect::<HashSet<_>>();
        assert_eq!(winners, HashSet::from([Some(1), Some(2)]));
    }

    #[test]
    fn test_previous_matching_is_discarded() {
        let mut points = population();
        points[0].is_matched = true;
        points[0].matched_with_id = Some(6);
        let mut rng = Pcg32::seed_from_u64(2);
        let matched = match_greedy(&points, &MatchingParams { caliper: 0.0 }, &mut rng).unwrap();
        assert!(matched.iter().all(|p| !p.is_matched));
    }

    #[test]
    fn test_rejects_invalid_input() {
        let mut rng = Pcg32::seed_from_u64(0);
        assert!(match_greedy(&population(), &MatchingParams { caliper: -1.0 }, &mut rng).is_err());
        let mut points = population();
        points[1].id = 1;
        assert_eq!(
            match_greedy(&points, &MatchingParams::default(), &mut rng),
            Err(ModelError::DuplicateId { id: 1 })
        );
    }

    #[test]
    fn test_asymmetric_reference_is_detected() {
        let mut points = population();
        points[0].is_matched = true;
        points[0].matched_with_id = Some(4);
        assert!(!is_symmetric(&points));
    }

    #[test]
    fn test_summary_balance_improves() {
        let mut rng = Pcg32::seed_from_u64(1);
        let matched = match_greedy(&population(), &MatchingParams::default(), &mut rng).unwrap();
        let summary = MatchingSummary::from_points(&matched);
        assert_eq!(summary.pairs, 2);
        assert_eq!(summary.treated, 3);
        assert!((summary.mean_pair_distance - 1.5).abs() < 1e-12);
        assert!(summary.balance_after.difference.abs() < summary.balance_before.difference.abs());
    }
}
