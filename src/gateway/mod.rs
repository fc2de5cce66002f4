//! Chat gateway used by the LLM judge.
//!
//! The tournament core never talks to a provider directly; it sees the
//! `Judge` trait. `LlmJudge` is the one judge that goes through here.

pub mod error;
pub mod openrouter;
pub mod types;

pub use error::{ErrorContext, GatewayError};
pub use openrouter::OpenRouterAdapter;
pub use types::*;

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError>;
}

#[async_trait::async_trait]
impl<G: ChatGateway + ?Sized> ChatGateway for std::sync::Arc<G> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, GatewayError> {
        (**self).chat(req).await
    }
}
