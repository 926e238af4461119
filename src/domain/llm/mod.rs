//! LLM provider domain models and traits

mod generation;
mod message;
mod provider;
mod registry;
mod request;
mod response;

pub use generation::{
    GenerationConfig, GenerationSettings, ProviderKind, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
pub use message::{Turn, TurnRole};
pub use provider::{LlmProvider, LlmStream};
pub use registry::{ProviderRegistry, ProviderStatus};
pub use request::{LlmRequest, LlmRequestBuilder};
pub use response::{FinishReason, StreamChunk};

#[cfg(test)]
pub use provider::mock::MockLlmProvider;
