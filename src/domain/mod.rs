//! Domain layer - Conversation model, provider contract and errors

pub mod error;
pub mod llm;

pub use error::DomainError;
pub use llm::{
    FinishReason, GenerationConfig, GenerationSettings, LlmProvider, LlmRequest, LlmStream,
    ProviderKind, ProviderRegistry, ProviderStatus, StreamChunk, Turn, TurnRole,
};
