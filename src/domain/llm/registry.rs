//! Registry of upstream providers keyed by provider kind

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use super::{LlmProvider, ProviderKind};
use crate::domain::DomainError;

#[derive(Debug, Clone)]
struct ProviderSlot {
    provider: Option<Arc<dyn LlmProvider>>,
    default_model: String,
}

/// Availability snapshot of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStatus {
    pub kind: ProviderKind,
    pub available: bool,
    pub default_model: String,
}

/// Holds the provider constructed for every [`ProviderKind`].
///
/// A kind whose credential is missing keeps an empty slot, which makes the
/// provider unavailable without affecting the others.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    slots: BTreeMap<ProviderKind, ProviderSlot>,
}

impl ProviderRegistry {
    /// Create a registry in which every provider is unavailable
    pub fn new() -> Self {
        let slots = ProviderKind::ALL
            .iter()
            .map(|kind| {
                (
                    *kind,
                    ProviderSlot {
                        provider: None,
                        default_model: kind.default_model().to_string(),
                    },
                )
            })
            .collect();

        Self { slots }
    }

    /// Register a provider under its own kind
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        let kind = provider.kind();
        self.slot_mut(kind).provider = Some(provider);
        self
    }

    /// Override the default model for a kind
    pub fn with_default_model(mut self, kind: ProviderKind, model: impl Into<String>) -> Self {
        self.slot_mut(kind).default_model = model.into();
        self
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.slots
            .get(&kind)
            .is_some_and(|slot| slot.provider.is_some())
    }

    /// Look up the provider for `kind`, failing when it is not configured
    pub fn resolve(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>, DomainError> {
        self.slots
            .get(&kind)
            .and_then(|slot| slot.provider.clone())
            .ok_or_else(|| DomainError::provider_unavailable(kind.display_name()))
    }

    pub fn default_model(&self, kind: ProviderKind) -> &str {
        self.slots
            .get(&kind)
            .map(|slot| slot.default_model.as_str())
            .unwrap_or_else(|| kind.default_model())
    }

    pub fn statuses(&self) -> Vec<ProviderStatus> {
        self.slots
            .iter()
            .map(|(kind, slot)| ProviderStatus {
                kind: *kind,
                available: slot.provider.is_some(),
                default_model: slot.default_model.clone(),
            })
            .collect()
    }

    pub fn available_count(&self) -> usize {
        self.slots.values().filter(|s| s.provider.is_some()).count()
    }

    fn slot_mut(&mut self, kind: ProviderKind) -> &mut ProviderSlot {
        self.slots.entry(kind).or_insert_with(|| ProviderSlot {
            provider: None,
            default_model: kind.default_model().to_string(),
        })
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;

    #[test]
    fn test_empty_registry_has_nothing_available() {
        let registry = ProviderRegistry::new();

        assert!(!registry.is_available(ProviderKind::OpenAi));
        assert!(!registry.is_available(ProviderKind::Anthropic));
        assert_eq!(registry.available_count(), 0);
    }

    #[test]
    fn test_resolve_missing_provider() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(MockLlmProvider::new(ProviderKind::OpenAi)));

        let err = registry.resolve(ProviderKind::Anthropic).unwrap_err();
        assert_eq!(err.to_string(), "Anthropic API key not configured");
        assert!(registry.resolve(ProviderKind::OpenAi).is_ok());
    }

    #[test]
    fn test_default_model_override() {
        let registry =
            ProviderRegistry::new().with_default_model(ProviderKind::OpenAi, "gpt-4o-mini");

        assert_eq!(registry.default_model(ProviderKind::OpenAi), "gpt-4o-mini");
        assert_eq!(
            registry.default_model(ProviderKind::Anthropic),
            "claude-3-opus-20240229"
        );
    }

    #[test]
    fn test_statuses_cover_every_kind() {
        let registry = ProviderRegistry::new()
            .with_provider(Arc::new(MockLlmProvider::new(ProviderKind::Anthropic)));

        let statuses = registry.statuses();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].kind, ProviderKind::OpenAi);
        assert!(!statuses[0].available);
        assert!(statuses[1].available);
    }
}
