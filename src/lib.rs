//! terminal-relay
//!
//! A streaming chat relay for multi-window terminal chat clients:
//! - `POST /api/{session_id}` relays a conversation to OpenAI or Anthropic
//!   and streams the generated text back as raw bytes
//! - a caller-side client turns that byte stream into completion events
//! - a terminal chat command plays the role of one chat window

pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use api::state::AppState;
use infrastructure::credentials::EnvCredentialProvider;
use infrastructure::llm::LlmProviderFactory;

/// Build application state from configuration. Credentials missing from
/// configuration are read from the conventional environment variables.
pub fn create_app_state_with_config(config: &AppConfig) -> anyhow::Result<AppState> {
    let mut providers = config.providers.clone();
    EnvCredentialProvider::default().apply(&mut providers);

    let registry = LlmProviderFactory::build_registry(&providers)?;
    Ok(AppState::new(registry))
}
