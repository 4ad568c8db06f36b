//! Judge-score bias analysis over already collected `{output, score}` records.
//!
//! - [`length`]: correlation between output length and score, with a
//!   first-order regression correction.
//! - [`format`]: correlation between structural markdown features and score.

pub mod format;
pub mod length;

use serde::{Deserialize, Serialize};

pub use format::{
    detect_features, FeatureBias, FormatBiasAnalyzer, FormatBiasConfig, FormatBiasDirection,
    FormatBiasReport, FormatFeature,
};
pub use length::{
    LengthBiasAnalysis, LengthBiasAnalyzer, LengthBiasConfig, LengthBiasDirection,
    LengthNormalization, LengthStats, NormalizedScore,
};

/// One judged output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredOutput {
    pub output: String,
    pub score: f64,
}

impl ScoredOutput {
    pub fn new(output: impl Into<String>, score: f64) -> Self {
        Self {
            output: output.into(),
            score,
        }
    }
}

/// Strength of a correlation, bucketed on `|r|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl BiasStrength {
    pub fn from_correlation(r: f64) -> Self {
        let r = r.abs();
        if r < 0.3 {
            Self::Weak
        } else if r < 0.5 {
            Self::Moderate
        } else if r < 0.7 {
            Self::Strong
        } else {
            Self::VeryStrong
        }
    }
}
