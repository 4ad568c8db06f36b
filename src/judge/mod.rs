//! The Judge boundary.
//!
//! A judge rates one output against a criterion and answers with a
//! pass/fail verdict plus confidence. [`Judge::try_evaluate`] exposes failures
//! as `Err`; [`Judge::evaluate`] folds them into a degraded [`Judgment`]
//! (`passed = false`, `confidence = 0.0`, `error = Some(..)`) so that
//! debiasing and consistency arithmetic always receives a value.

pub mod llm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::CacheError;
use crate::gateway::ProviderError;

pub use llm::{parse_judgment_response, JudgeSettings, LlmJudge};

/// One unit submitted to the judge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvaluationSample {
    pub input: String,
    pub output: String,
    pub criteria: String,
}

impl EvaluationSample {
    pub fn new(
        input: impl Into<String>,
        output: impl Into<String>,
        criteria: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            criteria: criteria.into(),
        }
    }
}

/// A judge verdict. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub passed: bool,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Judgment {
    pub fn new(passed: bool, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self {
            passed,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            error: None,
        }
    }

    /// Degraded verdict standing in for a failed judge call.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            passed: false,
            confidence: 0.0,
            reasoning: message.clone(),
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Whether a judge call may be served from, and stored into, a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    #[default]
    Use,
    /// Always call the model; nothing is read or written.
    Bypass,
}

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl JudgeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider(e) => e.is_retryable(),
            Self::Parse(_) => true,
            Self::Cache(_) => false,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Provider(e) => e.code(),
            Self::Parse(_) => "parse_error",
            Self::Cache(_) => "cache_error",
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Provider(e) => e.request_id(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn try_evaluate(
        &self,
        sample: &EvaluationSample,
        cache: CacheMode,
    ) -> Result<Judgment, JudgeError>;

    /// Infallible form of [`Judge::try_evaluate`].
    async fn evaluate(&self, sample: &EvaluationSample, cache: CacheMode) -> Judgment {
        match self.try_evaluate(sample, cache).await {
            Ok(judgment) => judgment,
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.code(),
                    "Judge call failed; using degraded judgment"
                );
                Judgment::failed(e.to_string())
            }
        }
    }
}
