//! Chat gateway: the `judge(prompt, temperature) -> text` capability.
//!
//! The judge wrapper talks to models only through [`ChatGateway`], so tests
//! and embedders can swap in scripted or alternative providers.

pub mod error;
pub mod openrouter;
pub mod types;

pub use error::{ErrorContext, ProviderError};
pub use openrouter::OpenRouterAdapter;
pub use types::*;

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}
