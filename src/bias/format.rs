//! Format bias: does the judge reward markdown structure regardless of content?
//!
//! Each feature is a regex over the raw output. Presence becomes a 0/1
//! indicator whose point-biserial correlation with score is reported per
//! feature.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BiasStrength, ScoredOutput};
use crate::stats::{mean, pearson_correlation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFeature {
    Headers,
    BulletLists,
    NumberedLists,
    CodeBlocks,
    BoldText,
    InlineCode,
    Links,
    Tables,
}

impl FormatFeature {
    pub const ALL: [FormatFeature; 8] = [
        FormatFeature::Headers,
        FormatFeature::BulletLists,
        FormatFeature::NumberedLists,
        FormatFeature::CodeBlocks,
        FormatFeature::BoldText,
        FormatFeature::InlineCode,
        FormatFeature::Links,
        FormatFeature::Tables,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Headers => "headers",
            Self::BulletLists => "bullet_lists",
            Self::NumberedLists => "numbered_lists",
            Self::CodeBlocks => "code_blocks",
            Self::BoldText => "bold_text",
            Self::InlineCode => "inline_code",
            Self::Links => "links",
            Self::Tables => "tables",
        }
    }

    fn pattern(&self) -> &'static str {
        match self {
            Self::Headers => r"(?m)^#{1,6}[ \t]+\S",
            Self::BulletLists => r"(?m)^[ \t]*[-*+][ \t]+\S",
            Self::NumberedLists => r"(?m)^[ \t]*\d+[.)][ \t]+\S",
            Self::CodeBlocks => r"(?s)```.*?```",
            // `__x__` is left out: it collides with dunder identifiers.
            Self::BoldText => r"\*\*[^*\n]+\*\*",
            Self::InlineCode => r"(?:^|[^`])`[^`\n]+`(?:[^`]|$)",
            Self::Links => r"\[[^\]\n]+\]\([^)\s]+\)",
            Self::Tables => r"(?m)^[ \t]*\|.*\|[ \t]*$",
        }
    }

    pub fn is_present(&self, text: &str) -> bool {
        FEATURE_PATTERNS
            .iter()
            .find(|(f, _)| f == self)
            .map(|(_, re)| re.is_match(text))
            .unwrap_or(false)
    }
}

static FEATURE_PATTERNS: Lazy<Vec<(FormatFeature, Regex)>> = Lazy::new(|| {
    FormatFeature::ALL
        .iter()
        .filter_map(|f| Regex::new(f.pattern()).ok().map(|re| (*f, re)))
        .collect()
});

/// Presence of every tracked feature in `text`.
pub fn detect_features(text: &str) -> BTreeMap<FormatFeature, bool> {
    FormatFeature::ALL
        .iter()
        .map(|f| (*f, f.is_present(text)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatBiasConfig {
    /// `|r|` above this flags a feature as biased.
    pub detection_threshold: f64,
}

impl Default for FormatBiasConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatBiasDirection {
    PrefersWith,
    PrefersWithout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureBias {
    /// Point-biserial correlation of presence with score.
    pub correlation: f64,
    pub bias_detected: bool,
    pub direction: FormatBiasDirection,
    pub strength: BiasStrength,
    /// Fraction of outputs carrying the feature.
    pub prevalence: f64,
    pub mean_score_with: Option<f64>,
    pub mean_score_without: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatBiasReport {
    pub features: BTreeMap<FormatFeature, FeatureBias>,
    /// Features whose bias crossed the threshold, in table order.
    pub significant_biases: Vec<FormatFeature>,
    pub significant_count: usize,
    pub sample_size: usize,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FormatBiasAnalyzer {
    config: FormatBiasConfig,
}

impl FormatBiasAnalyzer {
    pub fn new(config: FormatBiasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FormatBiasConfig {
        &self.config
    }

    pub fn analyze(&self, evaluations: &[ScoredOutput]) -> FormatBiasReport {
        let scores: Vec<f64> = evaluations.iter().map(|e| e.score).collect();
        let presence: Vec<BTreeMap<FormatFeature, bool>> = evaluations
            .iter()
            .map(|e| detect_features(&e.output))
            .collect();

        let mut features = BTreeMap::new();
        let mut significant_biases = Vec::new();

        for feature in FormatFeature::ALL {
            let indicator: Vec<f64> = presence
                .iter()
                .map(|p| if p.get(&feature).copied().unwrap_or(false) { 1.0 } else { 0.0 })
                .collect();
            let bias = self.feature_bias(&indicator, &scores);
            if bias.bias_detected {
                info!(
                    feature = feature.as_str(),
                    correlation = bias.correlation,
                    direction = ?bias.direction,
                    "Format bias detected"
                );
                significant_biases.push(feature);
            }
            features.insert(feature, bias);
        }

        FormatBiasReport {
            features,
            significant_count: significant_biases.len(),
            significant_biases,
            sample_size: evaluations.len(),
            insufficient_data: evaluations.len() < 2,
        }
    }

    fn feature_bias(&self, indicator: &[f64], scores: &[f64]) -> FeatureBias {
        let r = pearson_correlation(indicator, scores);
        let (with, without): (Vec<f64>, Vec<f64>) = {
            let mut with = Vec::new();
            let mut without = Vec::new();
            for (flag, score) in indicator.iter().zip(scores) {
                if *flag > 0.5 {
                    with.push(*score);
                } else {
                    without.push(*score);
                }
            }
            (with, without)
        };
        let prevalence = if indicator.is_empty() {
            0.0
        } else {
            with.len() as f64 / indicator.len() as f64
        };

        FeatureBias {
            correlation: r,
            bias_detected: r.abs() > self.config.detection_threshold,
            direction: if r > 0.0 {
                FormatBiasDirection::PrefersWith
            } else {
                FormatBiasDirection::PrefersWithout
            },
            strength: BiasStrength::from_correlation(r),
            prevalence,
            mean_score_with: (!with.is_empty()).then(|| mean(&with)),
            mean_score_without: (!without.is_empty()).then(|| mean(&without)),
        }
    }
}
