//! Repeated-sampling consistency audit.
//!
//! Asks the judge the same question several times with the cache bypassed and
//! measures how often it agrees with itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::judge::{CacheMode, EvaluationSample, Judge, Judgment};
use crate::stats::{mean, sample_variance};

pub const DEFAULT_REPETITIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    pub repetitions: usize,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            repetitions: DEFAULT_REPETITIONS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyResult {
    /// Every repetition returned the same verdict.
    pub consistent: bool,
    /// Share of the majority verdict, in `[0.5, 1]`.
    pub agreement_rate: f64,
    pub passed_ratio: f64,
    /// Sample variance of the confidences; 0 with fewer than two repetitions.
    pub confidence_variance: f64,
    pub mean_confidence: f64,
    pub repetitions: usize,
    /// Repetitions that came back as degraded judgments.
    pub error_count: usize,
    pub judgments: Vec<Judgment>,
}

impl ConsistencyResult {
    pub fn from_judgments(judgments: Vec<Judgment>) -> Self {
        let repetitions = judgments.len();
        let pass_count = judgments.iter().filter(|j| j.passed).count();
        let error_count = judgments.iter().filter(|j| j.is_error()).count();
        let confidences: Vec<f64> = judgments.iter().map(|j| j.confidence).collect();

        let (agreement_rate, passed_ratio) = if repetitions == 0 {
            (1.0, 0.0)
        } else {
            let majority = pass_count.max(repetitions - pass_count);
            (
                majority as f64 / repetitions as f64,
                pass_count as f64 / repetitions as f64,
            )
        };

        Self {
            consistent: pass_count == 0 || pass_count == repetitions,
            agreement_rate,
            passed_ratio,
            confidence_variance: sample_variance(&confidences),
            mean_confidence: mean(&confidences),
            repetitions,
            error_count,
            judgments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySample {
    pub input: String,
    pub output: String,
}

impl ConsistencySample {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InconsistentSample {
    pub index: usize,
    pub input: String,
    pub output: String,
    pub result: ConsistencyResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchConsistencyResult {
    /// Fraction of samples with unanimous verdicts.
    pub overall_consistency_rate: f64,
    pub mean_agreement_rate: f64,
    pub mean_confidence_variance: f64,
    pub total_samples: usize,
    pub consistent_samples: usize,
    pub inconsistent_samples: Vec<InconsistentSample>,
    pub results: Vec<ConsistencyResult>,
    pub insufficient_data: bool,
}

pub struct ConsistencyChecker<J: Judge + ?Sized> {
    judge: Arc<J>,
    repetitions: usize,
}

impl<J: Judge + ?Sized> ConsistencyChecker<J> {
    pub fn new(judge: Arc<J>) -> Self {
        Self::with_config(judge, ConsistencyConfig::default())
    }

    pub fn with_config(judge: Arc<J>, config: ConsistencyConfig) -> Self {
        Self::with_repetitions(judge, config.repetitions)
    }

    /// Repetitions below 1 are raised to 1.
    pub fn with_repetitions(judge: Arc<J>, repetitions: usize) -> Self {
        Self {
            judge,
            repetitions: repetitions.max(1),
        }
    }

    pub fn repetitions(&self) -> usize {
        self.repetitions
    }

    pub async fn check(&self, input: &str, output: &str, criteria: &str) -> ConsistencyResult {
        let sample = EvaluationSample::new(input, output, criteria);
        let mut judgments = Vec::with_capacity(self.repetitions);
        for rep in 0..self.repetitions {
            let judgment = self.judge.evaluate(&sample, CacheMode::Bypass).await;
            debug!(
                repetition = rep,
                passed = judgment.passed,
                confidence = judgment.confidence,
                "Consistency repetition"
            );
            judgments.push(judgment);
        }
        ConsistencyResult::from_judgments(judgments)
    }

    pub async fn check_batch(
        &self,
        samples: &[ConsistencySample],
        criteria: &str,
    ) -> BatchConsistencyResult {
        let mut results = Vec::with_capacity(samples.len());
        let mut inconsistent_samples = Vec::new();

        for (index, sample) in samples.iter().enumerate() {
            let result = self.check(&sample.input, &sample.output, criteria).await;
            if !result.consistent {
                inconsistent_samples.push(InconsistentSample {
                    index,
                    input: sample.input.clone(),
                    output: sample.output.clone(),
                    result: result.clone(),
                });
            }
            results.push(result);
        }

        let total_samples = results.len();
        let consistent_samples = total_samples - inconsistent_samples.len();
        let agreement: Vec<f64> = results.iter().map(|r| r.agreement_rate).collect();
        let variance: Vec<f64> = results.iter().map(|r| r.confidence_variance).collect();
        let overall_consistency_rate = if total_samples == 0 {
            0.0
        } else {
            consistent_samples as f64 / total_samples as f64
        };

        if !inconsistent_samples.is_empty() {
            info!(
                inconsistent = inconsistent_samples.len(),
                total = total_samples,
                "Judge inconsistency detected"
            );
        }

        BatchConsistencyResult {
            overall_consistency_rate,
            mean_agreement_rate: mean(&agreement),
            mean_confidence_variance: mean(&variance),
            total_samples,
            consistent_samples,
            inconsistent_samples,
            results,
            insufficient_data: total_samples == 0,
        }
    }
}
