//! LLM provider implementations

mod anthropic;
mod factory;
mod http_client;
mod openai;
mod sse;

pub use anthropic::{AnthropicProvider, DEFAULT_ANTHROPIC_BASE_URL};
pub use factory::LlmProviderFactory;
pub use http_client::{ByteStream, HttpClient, HttpClientTrait};
pub use openai::{DEFAULT_OPENAI_BASE_URL, OpenAiProvider};
pub use sse::{SseDecoder, SseEvent, SseStream, sse_events};

#[cfg(test)]
pub use http_client::mock::MockHttpClient;
