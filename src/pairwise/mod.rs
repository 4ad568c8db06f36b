//! Pairwise comparison with position-bias mitigation, and tournament ranking.

pub mod debiaser;
pub mod hooks;
pub mod tournament;
pub mod types;

pub use debiaser::{combine_judgments, PairwiseConfig, PositionDebiaser};
pub use hooks::{ComparisonEvent, ComparisonObserver, ObserverError};
pub use tournament::{round_robin_pairs, tally};
pub use types::{
    ComparisonResult, ComparisonSample, PairComparison, Ranking, RankingEntry, Winner,
};
