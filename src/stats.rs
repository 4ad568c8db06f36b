//! Statistical primitives for interpreting evaluation results.
//!
//! Pure functions over numeric samples: a normal-approximation confidence
//! interval, a two-sample significance test and Cohen's d. Degenerate input
//! never panics; it yields a neutral sentinel with `insufficient_data` set.

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::erf::erf;

/// Default confidence level for [`confidence_interval`].
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;
/// Default significance level for [`t_test`].
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

// =============================================================================
// Shared helpers
// =============================================================================

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased (n - 1) variance; 0 for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub fn sample_std_dev(values: &[f64]) -> f64 {
    sample_variance(values).sqrt()
}

/// Pearson correlation of two equally long series.
///
/// Returns 0 when fewer than two pairs exist or either series is constant.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mx = mean(xs);
    let my = mean(ys);

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Standard normal CDF.
pub fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / SQRT_2))
}

/// Two-sided critical z value for a confidence level.
pub fn z_critical(confidence_level: f64) -> f64 {
    const TABLE: &[(f64, f64)] = &[(0.90, 1.645), (0.95, 1.96), (0.99, 2.576)];
    if let Some((_, z)) = TABLE
        .iter()
        .find(|(level, _)| (level - confidence_level).abs() < 1e-9)
    {
        return *z;
    }
    let level = confidence_level.clamp(1e-6, 1.0 - 1e-6);
    match Normal::new(0.0, 1.0) {
        Ok(normal) => normal.inverse_cdf(0.5 + level / 2.0),
        Err(_) => 1.96,
    }
}

// =============================================================================
// Confidence interval
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
    /// Confidence level the bounds were computed for.
    pub confidence: f64,
    pub margin: f64,
    pub sample_size: usize,
    pub insufficient_data: bool,
}

/// Normal-approximation interval: `mean ± z * (s / sqrt(n))`.
pub fn confidence_interval(values: &[f64], confidence_level: f64) -> ConfidenceInterval {
    if values.is_empty() {
        return ConfidenceInterval {
            mean: 0.0,
            min: 0.0,
            max: 0.0,
            confidence: confidence_level,
            margin: 0.0,
            sample_size: 0,
            insufficient_data: true,
        };
    }

    let n = values.len();
    let m = mean(values);
    let margin = z_critical(confidence_level) * (sample_std_dev(values) / (n as f64).sqrt());

    ConfidenceInterval {
        mean: m,
        min: m - margin,
        max: m + margin,
        confidence: confidence_level,
        margin,
        sample_size: n,
        insufficient_data: n < 2,
    }
}

// =============================================================================
// Significance test
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    /// Positive when `result` is higher than `baseline` on average.
    pub t_statistic: f64,
    /// Two-tailed, normal approximation.
    pub p_value: f64,
    pub significant: bool,
    pub significance_level: f64,
    pub baseline_mean: f64,
    pub result_mean: f64,
    pub insufficient_data: bool,
}

/// Two-sample test of `result` against `baseline`.
///
/// Standard error is `sqrt(s_b²/n_b + s_r²/n_r)`; the p-value comes from the
/// normal CDF rather than Student's t.
pub fn t_test(baseline: &[f64], result: &[f64], significance_level: f64) -> TTestResult {
    let baseline_mean = mean(baseline);
    let result_mean = mean(result);
    let neutral = TTestResult {
        t_statistic: 0.0,
        p_value: 1.0,
        significant: false,
        significance_level,
        baseline_mean,
        result_mean,
        insufficient_data: true,
    };

    if baseline.is_empty() || result.is_empty() {
        return neutral;
    }

    let se = (sample_variance(baseline) / baseline.len() as f64
        + sample_variance(result) / result.len() as f64)
        .sqrt();
    if se == 0.0 || !se.is_finite() {
        return neutral;
    }

    let t = (result_mean - baseline_mean) / se;
    let p_value = (2.0 * (1.0 - normal_cdf(t.abs()))).clamp(0.0, 1.0);

    TTestResult {
        t_statistic: t,
        p_value,
        significant: p_value < significance_level,
        significance_level,
        baseline_mean,
        result_mean,
        insufficient_data: false,
    }
}

// =============================================================================
// Effect size
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    /// Cohen's conventional buckets on `|d|`.
    pub fn from_cohens_d(d: f64) -> Self {
        let d = d.abs();
        if d < 0.2 {
            Self::Negligible
        } else if d < 0.5 {
            Self::Small
        } else if d < 0.8 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectSize {
    pub cohens_d: f64,
    pub magnitude: EffectMagnitude,
    pub insufficient_data: bool,
}

/// Cohen's d of `result` over `baseline`, pooled SD `sqrt((s_b² + s_r²) / 2)`.
///
/// Antisymmetric: swapping the arguments negates `cohens_d` exactly.
pub fn effect_size(baseline: &[f64], result: &[f64]) -> EffectSize {
    let neutral = EffectSize {
        cohens_d: 0.0,
        magnitude: EffectMagnitude::Negligible,
        insufficient_data: true,
    };
    if baseline.is_empty() || result.is_empty() {
        return neutral;
    }

    let pooled = ((sample_variance(baseline) + sample_variance(result)) / 2.0).sqrt();
    if pooled == 0.0 || !pooled.is_finite() {
        return neutral;
    }

    let d = (mean(result) - mean(baseline)) / pooled;
    EffectSize {
        cohens_d: d,
        magnitude: EffectMagnitude::from_cohens_d(d),
        insufficient_data: false,
    }
}
