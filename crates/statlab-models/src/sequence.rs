//! Pattern mining over categorical action sequences.
//!
//! Two analyses of learner action logs:
//!
//! - [`mine_patterns`] finds contiguous action patterns (n-grams) that occur
//!   in at least `min_support` of the sequences. Mining is level-wise: a
//!   pattern of length `k + 1` is only counted when both of its length-`k`
//!   sub-patterns are frequent, since support can only shrink as a pattern grows.
//! - [`lag_sequential_analysis`] tests every `from → to` transition at a fixed
//!   lag against independence using adjusted residuals.

use std::collections::{BTreeMap, BTreeSet};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use statlab_stats::approx;

use crate::ModelError;

/// Longest pattern the miner will grow.
pub const MAX_PATTERN_LEN: usize = 8;

pub type Pattern = ArrayVec<String, MAX_PATTERN_LEN>;

/// A contiguous action pattern and the share of sequences containing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentPattern {
    pub pattern: Pattern,
    /// Sequences containing the pattern divided by the total number of sequences.
    pub support: f64,
    /// Number of sequences containing the pattern.
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MiningParams {
    pub min_support: f64,
    pub max_length: usize,
}

impl Default for MiningParams {
    fn default() -> Self {
        Self {
            min_support: 0.3,
            max_length: 4,
        }
    }
}

/// Finds every contiguous pattern with support of at least `min_support`.
///
/// Results are ordered by length, then by descending support, then
/// lexicographically. An empty sequence set yields no patterns.
///
/// # Examples
///
/// ```
/// # use statlab_models::sequence::{MiningParams, mine_patterns};
/// let logs = [
///     vec!["read".to_owned(), "quiz".to_owned()],
///     vec!["read".to_owned(), "quiz".to_owned(), "hint".to_owned()],
///     vec!["hint".to_owned()],
/// ];
/// let params = MiningParams { min_support: 0.5, max_length: 3 };
/// let patterns = mine_patterns(&logs, &params).unwrap();
/// let read_quiz = patterns.iter().find(|p| p.pattern.as_slice() == ["read", "quiz"]).unwrap();
/// assert!((read_quiz.support - 2.0 / 3.0).abs() < 1e-12);
/// ```
#[expect(clippy::cast_precision_loss)]
pub fn mine_patterns(
    sequences: &[Vec<String>],
    params: &MiningParams,
) -> Result<Vec<FrequentPattern>, ModelError> {
    ModelError::check_unit_interval("min_support", params.min_support)?;
    if params.max_length == 0 || params.max_length > MAX_PATTERN_LEN {
        return Err(ModelError::OutOfRange {
            name: "max_length",
            value: params.max_length as f64,
            expected: "[1, 8]",
        });
    }
    if sequences.is_empty() {
        return Ok(vec![]);
    }

    let total = sequences.len() as f64;
    let is_frequent = |count: usize| count > 0 && count as f64 / total >= params.min_support;

    let actions = sequences.iter().flatten().collect::<BTreeSet<_>>();
    let mut level = actions
        .into_iter()
        .map(|action| {
            let mut pattern = Pattern::new();
            pattern.push(action.clone());
            pattern
        })
        .map(|pattern| (support_count(sequences, &pattern), pattern))
        .filter(|(count, _)| is_frequent(*count))
        .collect::<Vec<_>>();
    let frequent_items = level
        .iter()
        .map(|(_, pattern)| pattern[0].clone())
        .collect::<Vec<_>>();

    let mut found = Vec::new();
    for length in 1..=params.max_length {
        tracing::trace!(length, frequent = level.len(), "pattern level mined");
        if level.is_empty() {
            break;
        }
        let known = level.iter().map(|(_, p)| p.clone()).collect::<BTreeSet<_>>();
        found.extend(level.iter().map(|(count, pattern)| FrequentPattern {
            pattern: pattern.clone(),
            support: *count as f64 / total,
            count: *count,
        }));
        if length == params.max_length {
            break;
        }

        level = known
            .iter()
            .flat_map(|prefix| {
                frequent_items.iter().map(move |item| {
                    let mut candidate = prefix.clone();
                    candidate.push(item.clone());
                    candidate
                })
            })
            .filter(|candidate| {
                let suffix = candidate[1..].iter().cloned().collect::<Pattern>();
                known.contains(&suffix)
            })
            .map(|candidate| (support_count(sequences, &candidate), candidate))
            .filter(|(count, _)| is_frequent(*count))
            .collect();
    }

    found.sort_by(|a, b| {
        a.pattern
            .len()
            .cmp(&b.pattern.len())
            .then_with(|| b.support.total_cmp(&a.support))
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    tracing::debug!(patterns = found.len(), "pattern mining finished");
    Ok(found)
}

fn support_count(sequences: &[Vec<String>], pattern: &[String]) -> usize {
    sequences
        .iter()
        .filter(|sequence| sequence.windows(pattern.len()).any(|window| window == pattern))
        .count()
}

/// Counts of `from → to` transitions at a fixed lag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionTable {
    /// Row and column labels, sorted.
    pub actions: Vec<String>,
    /// `counts[i][j]` is the number of times `actions[j]` followed `actions[i]`.
    pub counts: Vec<Vec<u64>>,
}

impl TransitionTable {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }
}

/// Tallies transitions `sequence[i] → sequence[i + lag]` within each sequence.
pub fn transition_counts(sequences: &[Vec<String>], lag: usize) -> Result<TransitionTable, ModelError> {
    if lag == 0 {
        return Err(ModelError::OutOfRange {
            name: "lag",
            value: 0.0,
            expected: "at least 1",
        });
    }
    let index = sequences
        .iter()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(i, action)| (action, i))
        .collect::<BTreeMap<_, _>>();

    let mut counts = vec![vec![0; index.len()]; index.len()];
    for sequence in sequences {
        for (from, to) in sequence.iter().zip(sequence.iter().skip(lag)) {
            counts[index[from]][index[to]] += 1;
        }
    }
    Ok(TransitionTable {
        actions: index.into_keys().cloned().collect(),
        counts,
    })
}

/// Significance test of one transition in a lag-sequential analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransitionStat {
    pub from: String,
    pub to: String,
    pub observed: u64,
    pub expected: f64,
    /// Adjusted residual; approximately standard normal under independence.
    pub z: f64,
    /// `|z|` exceeds the two-sided 95% critical value.
    pub significant: bool,
}

/// Adjusted residuals for every cell of the lag-`lag` transition table:
///
/// ```text
/// z = (o - e) / √(e · (1 - row / N) · (1 - col / N)),   e = row · col / N
/// ```
///
/// Cells whose denominator vanishes get `z = 0`.
#[expect(clippy::cast_precision_loss)]
pub fn lag_sequential_analysis(
    sequences: &[Vec<String>],
    lag: usize,
) -> Result<Vec<TransitionStat>, ModelError> {
    let table = transition_counts(sequences, lag)?;
    let total = table.total() as f64;
    let row_totals = table.counts.iter().map(|row| row.iter().sum::<u64>()).collect::<Vec<_>>();
    let column_totals = (0..table.actions.len())
        .map(|j| table.counts.iter().map(|row| row[j]).sum::<u64>())
        .collect::<Vec<_>>();
    let critical = approx::z_critical(0.95);

    let mut stats = Vec::with_capacity(table.actions.len().pow(2));
    for (i, from) in table.actions.iter().enumerate() {
        for (j, to) in table.actions.iter().enumerate() {
            let observed = table.counts[i][j];
            let (row, column) = (row_totals[i] as f64, column_totals[j] as f64);
            let (expected, variance) = if total > 0.0 {
                let expected = row * column / total;
                (expected, expected * (1.0 - row / total) * (1.0 - column / total))
            } else {
                (0.0, 0.0)
            };
            let z = if variance > 0.0 {
                (observed as f64 - expected) / variance.sqrt()
            } else {
                0.0
            };
            stats.push(TransitionStat {
                from: from.clone(),
                to: to.clone(),
                observed,
                expected,
                z,
                significant: z.abs() > critical,
            });
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(raw: &[&str]) -> Vec<Vec<String>> {
        raw.iter()
            .map(|s| s.split_whitespace().map(str::to_owned).collect())
            .collect()
    }

    #[test]
    fn test_support_is_share_of_sequences() {
        let sequences = logs(&["a b c", "a b", "b c", "c"]);
        let params = MiningParams {
            min_support: 0.0,
            max_length: 3,
        };
        let patterns = mine_patterns(&sequences, &params).unwrap();
        for pattern in &patterns {
            let containing = support_count(&sequences, &pattern.pattern);
            assert_eq!(pattern.count, containing);
            #[expect(clippy::cast_precision_loss)]
            let expected = containing as f64 / sequences.len() as f64;
            assert!((pattern.support - expected).abs() < 1e-12);
            assert!((0.0..=1.0).contains(&pattern.support));
        }
        let abc = patterns.iter().find(|p| p.pattern.as_slice() == ["a", "b", "c"]).unwrap();
        assert_eq!(abc.count, 1);
    }

    #[test]
    fn test_repeated_pattern_counts_once_per_sequence() {
        let sequences = logs(&["a a a a", "b"]);
        let patterns = mine_patterns(&sequences, &MiningParams::default()).unwrap();
        let aa = patterns.iter().find(|p| p.pattern.as_slice() == ["a", "a"]).unwrap();
        assert_eq!(aa.count, 1);
        assert!((aa.support - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_min_support_filters_and_order_is_stable() {
        let sequences = logs(&["a b", "a b", "b a", "c"]);
        let params = MiningParams {
            min_support: 0.5,
            max_length: 2,
        };
        let patterns = mine_patterns(&sequences, &params).unwrap();
        let names = patterns
            .iter()
            .map(|p| p.pattern.join(" "))
            .collect::<Vec<_>>();
        assert_eq!(names, ["a", "b", "a b"]);
        assert_eq!(patterns, mine_patterns(&sequences, &params).unwrap());
    }

    #[test]
    fn test_max_length_is_respected() {
        let sequences = logs(&["a b c d e", "a b c d e"]);
        let params = MiningParams {
            min_support: 1.0,
            max_length: 2,
        };
        let patterns = mine_patterns(&sequences, &params).unwrap();
        assert!(patterns.iter().all(|p| p.pattern.len() <= 2));
        assert_eq!(patterns.len(), 9);
    }

    #[test]
    fn test_invalid_params_and_empty_input() {
        let bad_support = MiningParams {
            min_support: 1.5,
            max_length: 2,
        };
        assert!(mine_patterns(&[], &bad_support).is_err());
        let bad_length = MiningParams {
            min_support: 0.5,
            max_length: MAX_PATTERN_LEN + 1,
        };
        assert!(mine_patterns(&[], &bad_length).is_err());
        assert!(mine_patterns(&[], &MiningParams::default()).unwrap().is_empty());
    }

    #[test]
    fn test_transition_counts() {
        let sequences = logs(&["a b a b", "b b"]);
        let table = transition_counts(&sequences, 1).unwrap();
        assert_eq!(table.actions, ["a", "b"]);
        assert_eq!(table.counts, vec![vec![0, 2], vec![1, 1]]);
        assert_eq!(table.total(), 4);

        let lag2 = transition_counts(&sequences, 2).unwrap();
        assert_eq!(lag2.counts, vec![vec![1, 0], vec![0, 1]]);
        assert!(transition_counts(&sequences, 0).is_err());
    }

    #[test]
    fn test_alternation_is_significant() {
        let line = "a b ".repeat(30);
        let sequences = logs(&[line.as_str(), line.as_str()]);
        let stats = lag_sequential_analysis(&sequences, 1).unwrap();
        let ab = stats.iter().find(|s| s.from == "a" && s.to == "b").unwrap();
        let aa = stats.iter().find(|s| s.from == "a" && s.to == "a").unwrap();
        assert!(ab.significant && ab.z > 0.0);
        assert!(aa.significant && aa.z < 0.0);
    }

    #[test]
    fn test_no_transitions_give_zero_residuals() {
        let stats = lag_sequential_analysis(&logs(&["a", "b"]), 1).unwrap();
        assert!(stats.iter().all(|s| s.z == 0.0 && !s.significant));
    }
}
