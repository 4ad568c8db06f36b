//! Records produced by pairwise comparison and tournament ranking.

use serde::{Deserialize, Serialize};

use crate::judge::Judgment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    A,
    B,
    Tie,
}

/// One head-to-head unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSample {
    pub input: String,
    pub output_a: String,
    pub output_b: String,
    pub criteria: String,
}

impl ComparisonSample {
    pub fn new(
        input: impl Into<String>,
        output_a: impl Into<String>,
        output_b: impl Into<String>,
        criteria: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output_a: output_a.into(),
            output_b: output_b.into(),
            criteria: criteria.into(),
        }
    }
}

/// Outcome of a forward/reverse comparison pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub winner: Winner,
    pub confidence: f64,
    /// Both orderings preferred the same output.
    pub consistent: bool,
    pub position_bias_detected: bool,
    /// A shown first.
    pub forward_judgment: Judgment,
    /// B shown first.
    pub reverse_judgment: Judgment,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    /// Position in the ranked input list.
    pub index: usize,
    pub output: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairComparison {
    pub i: usize,
    pub j: usize,
    pub result: ComparisonResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    /// Descending by score.
    pub entries: Vec<RankingEntry>,
    pub comparisons: Vec<PairComparison>,
    pub position_bias_count: usize,
    pub total_comparisons: usize,
}

impl Ranking {
    pub fn order(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.index).collect()
    }

    /// Share of comparisons that showed position bias; 0 with no comparisons.
    pub fn position_bias_rate(&self) -> f64 {
        if self.total_comparisons == 0 {
            0.0
        } else {
            self.position_bias_count as f64 / self.total_comparisons as f64
        }
    }
}
