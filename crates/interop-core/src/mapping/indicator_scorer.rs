//! Generic indicator-table-driven scorer shared by the Resource Predictor
//! (C7) and the OMOP table predictor (C11), per spec.md §4.7/§4.11's shared
//! "same indicator-table-driven scorer, parameterized by target enum" design.

use std::collections::HashMap;
use std::hash::Hash;

/// One scoring rule: if a field name contains any of `patterns`
/// (case-insensitive substring match), `target` gains `weight` points and
/// the matched field is recorded as a key indicator.
pub struct Indicator<T> {
    pub patterns: &'static [&'static str],
    pub target: T,
    pub weight: f64,
}

pub struct IndicatorScore<T> {
    pub winner: T,
    pub winner_score: f64,
    pub runner_up_score: f64,
    pub key_indicators: Vec<String>,
    /// All targets with a nonzero score, sorted by score descending.
    pub ranked: Vec<(T, f64)>,
}

pub struct IndicatorScorer<T: Copy + Eq + Hash> {
    indicators: Vec<Indicator<T>>,
    default_target: T,
}

impl<T: Copy + Eq + Hash> IndicatorScorer<T> {
    pub fn new(indicators: Vec<Indicator<T>>, default_target: T) -> Self {
        Self { indicators, default_target }
    }

    /// Scores a schema's field names against the indicator table. When no
    /// indicator matches anything, returns the scorer's default target at
    /// score 0 (callers apply the spec's "zero matches -> default target,
    /// confidence exactly 0.60" rule on top of this).
    pub fn score(&self, field_names: &[String]) -> IndicatorScore<T> {
        let mut totals: HashMap<T, f64> = HashMap::new();
        let mut matched_fields: HashMap<T, Vec<String>> = HashMap::new();

        for field_name in field_names {
            let lowered = field_name.to_lowercase();
            for indicator in &self.indicators {
                if indicator.patterns.iter().any(|pattern| lowered.contains(pattern)) {
                    *totals.entry(indicator.target).or_insert(0.0) += indicator.weight;
                    matched_fields.entry(indicator.target).or_default().push(field_name.clone());
                }
            }
        }

        let mut ranked: Vec<(T, f64)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        if ranked.is_empty() {
            return IndicatorScore {
                winner: self.default_target,
                winner_score: 0.0,
                runner_up_score: 0.0,
                key_indicators: Vec::new(),
                ranked: Vec::new(),
            };
        }

        let (winner, winner_score) = ranked[0];
        let runner_up_score = ranked.get(1).map(|(_, score)| *score).unwrap_or(0.0);
        let key_indicators = matched_fields.remove(&winner).unwrap_or_default();

        IndicatorScore { winner, winner_score, runner_up_score, key_indicators, ranked }
    }
}

/// `confidence = 0.6 + 0.35 * (winnerScore - runnerUpScore) / winnerScore`,
/// clamped to `[0.6, 0.95]` (spec.md §4.7). Zero-match schemas (winner_score
/// == 0) return exactly `0.60` per spec.md §8's boundary behavior.
pub fn margin_confidence(winner_score: f64, runner_up_score: f64) -> f64 {
    if winner_score <= 0.0 {
        return 0.60;
    }
    (0.6 + 0.35 * (winner_score - runner_up_score) / winner_score).clamp(0.6, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Target {
        A,
        B,
    }

    #[test]
    fn no_matches_returns_default_target_at_zero() {
        let scorer = IndicatorScorer::new(vec![Indicator { patterns: &["foo"], target: Target::A, weight: 5.0 }], Target::B);
        let score = scorer.score(&["unrelated".to_string()]);
        assert_eq!(score.winner, Target::B);
        assert_eq!(score.winner_score, 0.0);
    }

    #[test]
    fn highest_scoring_target_wins() {
        let scorer = IndicatorScorer::new(
            vec![
                Indicator { patterns: &["diagnosis_code", "icd"], target: Target::A, weight: 5.0 },
                Indicator { patterns: &["lab_code"], target: Target::B, weight: 5.0 },
            ],
            Target::A,
        );
        let score = scorer.score(&["diagnosis_code".to_string(), "notes".to_string()]);
        assert_eq!(score.winner, Target::A);
        assert_eq!(score.key_indicators, vec!["diagnosis_code".to_string()]);
    }

    #[test]
    fn margin_confidence_is_bounded() {
        assert_eq!(margin_confidence(0.0, 0.0), 0.60);
        assert_eq!(margin_confidence(5.0, 0.0), 0.95);
        assert!(margin_confidence(5.0, 4.0) < 0.70);
    }
}
