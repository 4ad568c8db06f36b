//! Length bias: does the judge reward longer (or shorter) outputs?

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{BiasStrength, ScoredOutput};
use crate::stats::{mean, pearson_correlation, sample_std_dev};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthBiasConfig {
    /// `|r|` above this flags length bias.
    pub detection_threshold: f64,
}

impl Default for LengthBiasConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthBiasDirection {
    PrefersLonger,
    PrefersShorter,
}

/// Character-length diagnostics for the analysed set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LengthStats {
    pub min: usize,
    pub max: usize,
    pub mean: f64,
    pub std_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthBiasAnalysis {
    pub correlation: f64,
    pub bias_detected: bool,
    pub direction: LengthBiasDirection,
    pub strength: BiasStrength,
    pub length_stats: LengthStats,
    pub sample_size: usize,
    pub insufficient_data: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub output: String,
    pub length: usize,
    pub score: f64,
    pub normalized_score: f64,
    pub adjustment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LengthNormalization {
    pub analysis: LengthBiasAnalysis,
    /// False when no bias was detected and scores pass through untouched.
    pub applied: bool,
    /// Regression slope of score on length (`cov / var`).
    pub slope: f64,
    pub target_correlation: f64,
    pub scores: Vec<NormalizedScore>,
}

#[derive(Debug, Clone, Default)]
pub struct LengthBiasAnalyzer {
    config: LengthBiasConfig,
}

impl LengthBiasAnalyzer {
    pub fn new(config: LengthBiasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LengthBiasConfig {
        &self.config
    }

    pub fn analyze_length_correlation(&self, evaluations: &[ScoredOutput]) -> LengthBiasAnalysis {
        let lengths = lengths_of(evaluations);
        let scores: Vec<f64> = evaluations.iter().map(|e| e.score).collect();
        let r = pearson_correlation(&lengths, &scores);
        let bias_detected = r.abs() > self.config.detection_threshold;

        let analysis = LengthBiasAnalysis {
            correlation: r,
            bias_detected,
            direction: if r > 0.0 {
                LengthBiasDirection::PrefersLonger
            } else {
                LengthBiasDirection::PrefersShorter
            },
            strength: BiasStrength::from_correlation(r),
            length_stats: length_stats(&lengths),
            sample_size: evaluations.len(),
            insufficient_data: evaluations.len() < 2,
        };

        if bias_detected {
            info!(
                correlation = r,
                direction = ?analysis.direction,
                samples = evaluations.len(),
                "Length bias detected"
            );
        }
        analysis
    }

    /// First-order correction: subtract `slope * (len - mean_len) * (1 - |target|)`
    /// from each score and clamp to `[0, 1]`.
    ///
    /// Returns the scores unchanged when no bias is detected.
    pub fn normalize_for_length(
        &self,
        evaluations: &[ScoredOutput],
        target_correlation: f64,
    ) -> LengthNormalization {
        let target_correlation = target_correlation.clamp(-1.0, 1.0);
        let analysis = self.analyze_length_correlation(evaluations);
        let lengths = lengths_of(evaluations);

        if !analysis.bias_detected {
            let scores = evaluations
                .iter()
                .zip(&lengths)
                .map(|(e, len)| NormalizedScore {
                    output: e.output.clone(),
                    length: *len as usize,
                    score: e.score,
                    normalized_score: e.score,
                    adjustment: 0.0,
                })
                .collect();
            return LengthNormalization {
                analysis,
                applied: false,
                slope: 0.0,
                target_correlation,
                scores,
            };
        }

        let scores: Vec<f64> = evaluations.iter().map(|e| e.score).collect();
        let slope = regression_slope(&lengths, &scores);
        let mean_length = mean(&lengths);
        let damping = 1.0 - target_correlation.abs();

        let scores = evaluations
            .iter()
            .zip(&lengths)
            .map(|(e, len)| {
                let adjustment = slope * (len - mean_length) * damping;
                NormalizedScore {
                    output: e.output.clone(),
                    length: *len as usize,
                    score: e.score,
                    normalized_score: (e.score - adjustment).clamp(0.0, 1.0),
                    adjustment,
                }
            })
            .collect();

        LengthNormalization {
            analysis,
            applied: true,
            slope,
            target_correlation,
            scores,
        }
    }
}

fn lengths_of(evaluations: &[ScoredOutput]) -> Vec<f64> {
    evaluations
        .iter()
        .map(|e| e.output.chars().count() as f64)
        .collect()
}

fn length_stats(lengths: &[f64]) -> LengthStats {
    if lengths.is_empty() {
        return LengthStats {
            min: 0,
            max: 0,
            mean: 0.0,
            std_dev: 0.0,
        };
    }
    let min = lengths.iter().copied().fold(f64::INFINITY, f64::min);
    let max = lengths.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    LengthStats {
        min: min as usize,
        max: max as usize,
        mean: mean(lengths),
        std_dev: sample_std_dev(lengths),
    }
}

fn regression_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let mx = mean(xs);
    let my = mean(ys);
    let (cov, var) = xs
        .iter()
        .zip(ys)
        .fold((0.0, 0.0), |(cov, var), (x, y)| {
            (cov + (x - mx) * (y - my), var + (x - mx) * (x - mx))
        });
    if var == 0.0 {
        0.0
    } else {
        cov / var
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(pairs: &[(&str, f64)]) -> Vec<ScoredOutput> {
        pairs.iter().map(|(o, s)| ScoredOutput::new(*o, *s)).collect()
    }

    #[test]
    fn longer_preferred_is_detected() {
        let evals = sample(&[("short", 0.2), ("a long verbose answer", 0.9)]);
        let a = LengthBiasAnalyzer::default().analyze_length_correlation(&evals);
        assert!(a.bias_detected);
        assert_eq!(a.direction, LengthBiasDirection::PrefersLonger);
        assert_eq!(a.strength, BiasStrength::VeryStrong);
        assert_eq!(a.length_stats.min, 5);
        assert_eq!(a.length_stats.max, 21);
    }

    #[test]
    fn shorter_preferred_has_negative_correlation() {
        let evals = sample(&[("ok", 0.9), ("medium text", 0.6), ("a rather long reply here", 0.1)]);
        let a = LengthBiasAnalyzer::default().analyze_length_correlation(&evals);
        assert!(a.correlation < -0.5);
        assert_eq!(a.direction, LengthBiasDirection::PrefersShorter);
    }

    #[test]
    fn empty_input_is_neutral() {
        let a = LengthBiasAnalyzer::default().analyze_length_correlation(&[]);
        assert_eq!(a.correlation, 0.0);
        assert!(!a.bias_detected);
        assert!(a.insufficient_data);
    }

    #[test]
    fn normalization_is_noop_without_bias() {
        let evals = sample(&[("aaaa", 0.5), ("bb", 0.7), ("cccccc", 0.6), ("d", 0.4)]);
        let analyzer = LengthBiasAnalyzer::default();
        assert!(analyzer.analyze_length_correlation(&evals).correlation.abs() <= 0.5);
        let n = analyzer.normalize_for_length(&evals, 0.0);
        assert!(!n.applied);
        for (orig, norm) in evals.iter().zip(&n.scores) {
            assert_eq!(orig.score, norm.normalized_score);
        }
    }

    #[test]
    fn normalization_flattens_linear_bias() {
        // score = 0.01 * length exactly
        let evals = sample(&[
            ("x".repeat(10).as_str(), 0.1),
            ("x".repeat(30).as_str(), 0.3),
            ("x".repeat(50).as_str(), 0.5),
            ("x".repeat(70).as_str(), 0.7),
        ]);
        let n = LengthBiasAnalyzer::default().normalize_for_length(&evals, 0.0);
        assert!(n.applied);
        assert!((n.slope - 0.01).abs() < 1e-12);
        for s in &n.scores {
            assert!((s.normalized_score - 0.4).abs() < 1e-9);
        }
    }

    #[test]
    fn target_correlation_damps_adjustment() {
        let evals = sample(&[("x", 0.0), ("xxx", 1.0)]);
        let full = LengthBiasAnalyzer::default().normalize_for_length(&evals, 0.0);
        let half = LengthBiasAnalyzer::default().normalize_for_length(&evals, 0.5);
        assert!((half.scores[0].adjustment - full.scores[0].adjustment / 2.0).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_target_never_amplifies_bias() {
        let evals = sample(&[("x", 0.1), ("xxx", 0.9)]);
        let n = LengthBiasAnalyzer::default().normalize_for_length(&evals, 2.0);
        assert_eq!(n.target_correlation, 1.0);
        for s in &n.scores {
            assert_eq!(s.adjustment, 0.0);
            assert_eq!(s.normalized_score, s.score);
        }
    }
}
