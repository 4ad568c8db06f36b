//! Position-debiased pairwise comparison.
//!
//! Each comparison is judged twice, once with A shown first and once with B
//! shown first. Agreement between the two orderings yields a confident
//! verdict; disagreement is treated as position bias and penalised.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::judge::{CacheMode, EvaluationSample, Judge, Judgment};
use crate::prompts::{pairwise_criteria, pairwise_output};

use super::hooks::{ComparisonEvent, ComparisonObserver};
use super::tournament::{round_robin_pairs, tally};
use super::types::{
    ComparisonResult, ComparisonSample, PairComparison, Ranking, RankingEntry, Winner,
};

pub const DEFAULT_CONFIDENCE_GAP: f64 = 0.2;
/// Ceiling on the combined confidence of disagreeing orderings.
pub const INCONSISTENT_CONFIDENCE_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairwiseConfig {
    /// Confidence margin one ordering needs to overrule the other when they
    /// disagree.
    pub confidence_gap: f64,
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            confidence_gap: DEFAULT_CONFIDENCE_GAP,
        }
    }
}

/// Combine forward (A first) and reverse (B first) judgments.
///
/// Both judgments answer "is the first-shown output better?".
pub fn combine_judgments(
    forward: Judgment,
    reverse: Judgment,
    config: &PairwiseConfig,
) -> ComparisonResult {
    let forward_prefers_a = forward.passed;
    let reverse_prefers_a = !reverse.passed;
    let consistent = forward_prefers_a == reverse_prefers_a;
    let preference = |prefers_a: bool| if prefers_a { Winner::A } else { Winner::B };

    let (winner, confidence) = if consistent {
        (
            preference(forward_prefers_a),
            (forward.confidence + reverse.confidence) / 2.0,
        )
    } else {
        let gap = forward.confidence - reverse.confidence;
        let winner = if gap > config.confidence_gap {
            preference(forward_prefers_a)
        } else if -gap > config.confidence_gap {
            preference(reverse_prefers_a)
        } else {
            Winner::Tie
        };
        (
            winner,
            ((forward.confidence + reverse.confidence) / 4.0).min(INCONSISTENT_CONFIDENCE_CAP),
        )
    };

    let reasoning = format!(
        "Forward (A first): {}\nReverse (B first): {}",
        forward.reasoning.trim(),
        reverse.reasoning.trim()
    );

    ComparisonResult {
        winner,
        confidence,
        consistent,
        position_bias_detected: !consistent,
        forward_judgment: forward,
        reverse_judgment: reverse,
        reasoning,
    }
}

pub struct PositionDebiaser<J: Judge + ?Sized> {
    judge: Arc<J>,
    config: PairwiseConfig,
    cache_mode: CacheMode,
    observer: Option<Arc<dyn ComparisonObserver>>,
}

impl<J: Judge + ?Sized> PositionDebiaser<J> {
    pub fn new(judge: Arc<J>) -> Self {
        Self::with_config(judge, PairwiseConfig::default())
    }

    pub fn with_config(judge: Arc<J>, config: PairwiseConfig) -> Self {
        Self {
            judge,
            config,
            cache_mode: CacheMode::Use,
            observer: None,
        }
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ComparisonObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &PairwiseConfig {
        &self.config
    }

    /// Two sequential judge calls: A first, then B first.
    pub async fn compare(
        &self,
        input: &str,
        output_a: &str,
        output_b: &str,
        criteria: &str,
    ) -> ComparisonResult {
        let criteria = pairwise_criteria(criteria);
        let forward = EvaluationSample::new(input, pairwise_output(output_a, output_b), &criteria);
        let reverse = EvaluationSample::new(input, pairwise_output(output_b, output_a), &criteria);

        let forward = self.judge.evaluate(&forward, self.cache_mode).await;
        let reverse = self.judge.evaluate(&reverse, self.cache_mode).await;

        let result = combine_judgments(forward, reverse, &self.config);
        debug!(
            winner = ?result.winner,
            confidence = result.confidence,
            consistent = result.consistent,
            "Pairwise comparison"
        );
        result
    }

    pub async fn compare_sample(&self, sample: &ComparisonSample) -> ComparisonResult {
        self.compare(
            &sample.input,
            &sample.output_a,
            &sample.output_b,
            &sample.criteria,
        )
        .await
    }

    /// Round-robin tournament over every unordered pair of `outputs`.
    pub async fn rank(&self, input: &str, outputs: &[String], criteria: &str) -> Ranking {
        let pairs = round_robin_pairs(outputs.len());
        let total = pairs.len();
        let mut comparisons = Vec::with_capacity(total);

        for (completed, (i, j)) in pairs.into_iter().enumerate() {
            let result = self.compare(input, &outputs[i], &outputs[j], criteria).await;
            if let Some(observer) = &self.observer {
                let event = ComparisonEvent {
                    i,
                    j,
                    completed: completed + 1,
                    total,
                    result: result.clone(),
                };
                if let Err(e) = observer.on_comparison(event).await {
                    warn!(error = %e, i, j, "Comparison observer failed");
                }
            }
            comparisons.push(PairComparison { i, j, result });
        }

        let outcomes: Vec<(usize, usize, Winner)> = comparisons
            .iter()
            .map(|c| (c.i, c.j, c.result.winner))
            .collect();
        let entries = tally(outputs.len(), &outcomes)
            .into_iter()
            .map(|(index, score)| RankingEntry {
                index,
                output: outputs[index].clone(),
                score,
            })
            .collect();

        let position_bias_count = comparisons
            .iter()
            .filter(|c| c.result.position_bias_detected)
            .count();
        if position_bias_count > 0 {
            info!(
                position_bias_count,
                total_comparisons = total,
                "Position bias detected in tournament"
            );
        }

        Ranking {
            entries,
            comparisons,
            position_bias_count,
            total_comparisons: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn j(passed: bool, confidence: f64) -> Judgment {
        Judgment::new(passed, confidence, "")
    }

    #[test]
    fn agreeing_orderings_average_confidence() {
        let cfg = PairwiseConfig::default();

        let r = combine_judgments(j(true, 0.8), j(false, 0.6), &cfg);
        assert_eq!(r.winner, Winner::A);
        assert!(r.consistent);
        assert!(!r.position_bias_detected);
        assert!((r.confidence - 0.7).abs() < 1e-12);

        let r = combine_judgments(j(false, 0.9), j(true, 0.9), &cfg);
        assert_eq!(r.winner, Winner::B);
        assert!((r.confidence - 0.9).abs() < 1e-12);
    }

    #[test]
    fn disagreement_without_margin_is_a_tie() {
        // Both orderings prefer whichever output is shown first.
        let r = combine_judgments(j(true, 0.8), j(true, 0.7), &PairwiseConfig::default());
        assert_eq!(r.winner, Winner::Tie);
        assert!(!r.consistent);
        assert!(r.position_bias_detected);
        assert!((r.confidence - 0.375).abs() < 1e-12);
    }

    #[test]
    fn disagreement_with_margin_follows_confident_ordering() {
        let cfg = PairwiseConfig::default();

        let r = combine_judgments(j(true, 0.9), j(true, 0.3), &cfg);
        assert_eq!(r.winner, Winner::A);
        assert!((r.confidence - 0.3).abs() < 1e-12);

        let r = combine_judgments(j(true, 0.3), j(true, 0.9), &cfg);
        assert_eq!(r.winner, Winner::B);
    }

    #[test]
    fn inconsistent_confidence_is_capped() {
        let r = combine_judgments(j(false, 1.0), j(false, 1.0), &PairwiseConfig::default());
        assert_eq!(r.winner, Winner::Tie);
        assert_eq!(r.confidence, 0.5);
    }

    #[test]
    fn degraded_judgments_resolve_to_low_confidence() {
        let r = combine_judgments(
            Judgment::failed("timeout"),
            Judgment::failed("timeout"),
            &PairwiseConfig::default(),
        );
        assert!(!r.consistent);
        assert_eq!(r.winner, Winner::Tie);
        assert_eq!(r.confidence, 0.0);
    }
}
