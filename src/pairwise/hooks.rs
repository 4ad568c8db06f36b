//! Extension hooks for tournament ranking.
//!
//! The debiaser stays storage-agnostic. Callers can inject a per-comparison
//! side effect (progress reporting, persistence) through [`ComparisonObserver`].

use super::types::ComparisonResult;

#[derive(Debug, Clone)]
pub struct ComparisonEvent {
    pub i: usize,
    pub j: usize,
    /// 1-based position of this comparison in the tournament.
    pub completed: usize,
    pub total: usize,
    pub result: ComparisonResult,
}

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    #[error("{0}")]
    Message(String),
}

#[async_trait::async_trait]
pub trait ComparisonObserver: Send + Sync {
    async fn on_comparison(&self, event: ComparisonEvent) -> Result<(), ObserverError>;
}
