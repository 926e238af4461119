use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::http_client::HttpClient;
use super::{AnthropicProvider, OpenAiProvider};
use crate::config::{ProviderSettings, ProvidersConfig};
use crate::domain::{DomainError, LlmProvider, ProviderKind, ProviderRegistry};

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Build the registry from configuration. A provider without an API key
    /// is left unavailable; startup does not fail because of it.
    pub fn build_registry(config: &ProvidersConfig) -> Result<ProviderRegistry, DomainError> {
        let http_client =
            HttpClient::with_connect_timeout(Duration::from_secs(config.connect_timeout_secs))?;
        let mut registry = ProviderRegistry::new();

        for kind in ProviderKind::ALL {
            let settings = config.settings(kind);

            if let Some(model) = settings.default_model.as_deref().filter(|m| !m.trim().is_empty()) {
                registry = registry.with_default_model(kind, model);
            }

            match Self::create(kind, settings, http_client.clone()) {
                Some(provider) => {
                    info!(provider = %kind, "Provider configured");
                    registry = registry.with_provider(provider);
                }
                None => {
                    warn!(provider = %kind, "{} API key not configured", kind.display_name());
                }
            }
        }

        Ok(registry)
    }

    /// Create one provider, or `None` when it has no API key
    pub fn create(
        kind: ProviderKind,
        settings: &ProviderSettings,
        http_client: HttpClient,
    ) -> Option<Arc<dyn LlmProvider>> {
        let api_key = settings.api_key()?;
        let base_url = settings.base_url.as_deref();

        let provider: Arc<dyn LlmProvider> = match (kind, base_url) {
            (ProviderKind::OpenAi, Some(url)) => {
                Arc::new(OpenAiProvider::with_base_url(http_client, api_key, url))
            }
            (ProviderKind::OpenAi, None) => Arc::new(OpenAiProvider::new(http_client, api_key)),
            (ProviderKind::Anthropic, Some(url)) => {
                Arc::new(AnthropicProvider::with_base_url(http_client, api_key, url))
            }
            (ProviderKind::Anthropic, None) => {
                Arc::new(AnthropicProvider::new(http_client, api_key))
            }
        };

        Some(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(key: &str) -> ProviderSettings {
        ProviderSettings {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_requires_api_key() {
        let provider = LlmProviderFactory::create(
            ProviderKind::OpenAi,
            &ProviderSettings::default(),
            HttpClient::new(),
        );
        assert!(provider.is_none());
    }

    #[test]
    fn test_create_matches_kind() {
        let provider =
            LlmProviderFactory::create(ProviderKind::Anthropic, &with_key("sk-ant"), HttpClient::new())
                .unwrap();
        assert_eq!(provider.kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn test_build_registry_tolerates_missing_keys() {
        let config = ProvidersConfig {
            openai: with_key("sk-test"),
            ..Default::default()
        };

        let registry = LlmProviderFactory::build_registry(&config).unwrap();

        assert!(registry.is_available(ProviderKind::OpenAi));
        assert!(!registry.is_available(ProviderKind::Anthropic));
        assert_eq!(registry.available_count(), 1);
    }

    #[test]
    fn test_build_registry_applies_default_model() {
        let config = ProvidersConfig {
            anthropic: ProviderSettings {
                default_model: Some("claude-3-5-sonnet-latest".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };

        let registry = LlmProviderFactory::build_registry(&config).unwrap();

        assert_eq!(
            registry.default_model(ProviderKind::Anthropic),
            "claude-3-5-sonnet-latest"
        );
        assert_eq!(registry.default_model(ProviderKind::OpenAi), "gpt-4o");
    }
}
