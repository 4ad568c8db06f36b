#![forbid(unsafe_code)]

//! # verdict-harness
//!
//! Measure and correct the systematic biases of LLM-as-judge evaluation.
//!
//! LLM judges prefer whichever answer is shown first, reward length and
//! markdown decoration, and do not always agree with themselves. This crate
//! quantifies those distortions and mitigates the ones it can:
//!
//! - [`pairwise`]: forward/reverse comparisons that detect position bias, and
//!   round-robin tournament ranking on top of them.
//! - [`consistency`]: repeated sampling of the same judgment.
//! - [`bias`]: length and format correlation against collected scores, with a
//!   first-order length correction.
//! - [`stats`]: confidence intervals, t-tests and effect sizes for comparing
//!   a run against its baseline, addressed through [`field::FieldContext`].
//!
//! The judge itself sits behind the [`judge::Judge`] trait. [`judge::LlmJudge`]
//! implements it over any [`gateway::ChatGateway`] with an optional injected
//! [`cache::JudgmentCache`].

pub mod bias;
pub mod cache;
pub mod config;
pub mod consistency;
pub mod field;
pub mod gateway;
pub mod judge;
pub mod pairwise;
pub mod prompts;
pub mod stats;

pub use bias::{
    FormatBiasAnalyzer, FormatBiasReport, LengthBiasAnalysis, LengthBiasAnalyzer, ScoredOutput,
};
pub use cache::{InMemoryJudgmentCache, JudgmentCache, JudgmentCacheKey, SqliteJudgmentCache};
pub use config::{ConfigError, HarnessConfig};
pub use consistency::{BatchConsistencyResult, ConsistencyChecker, ConsistencyResult};
pub use field::{FieldContext, FieldError};
pub use gateway::{ChatGateway, OpenRouterAdapter, ProviderError};
pub use judge::{CacheMode, EvaluationSample, Judge, JudgeError, JudgeSettings, Judgment, LlmJudge};
pub use pairwise::{
    ComparisonObserver, ComparisonResult, PairwiseConfig, PositionDebiaser, Ranking, Winner,
};
pub use stats::{confidence_interval, effect_size, t_test};
