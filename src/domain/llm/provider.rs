use async_trait::async_trait;
use futures::Stream;
use std::fmt::Debug;
use std::pin::Pin;

use super::{LlmRequest, ProviderKind, StreamChunk};
use crate::domain::DomainError;

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, DomainError>> + Send>>;

/// Trait for upstream LLM providers (OpenAI, Anthropic)
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Open a streaming chat completion.
    ///
    /// Errors returned here happen before any output exists. Errors yielded by
    /// the stream are mid-stream failures.
    async fn chat_stream(&self, request: LlmRequest) -> Result<LlmStream, DomainError>;

    /// Which vendor this provider talks to
    fn kind(&self) -> ProviderKind;
}
