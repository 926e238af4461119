use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::ProvidersConfig;
use crate::domain::ProviderKind;

type Lookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment variable names for one provider
#[derive(Debug, Clone)]
pub struct EnvMapping {
    pub api_key_var: String,
    pub base_url_var: Option<String>,
}

impl EnvMapping {
    pub fn new(api_key_var: impl Into<String>) -> Self {
        Self {
            api_key_var: api_key_var.into(),
            base_url_var: None,
        }
    }

    pub fn with_base_url_var(mut self, var: impl Into<String>) -> Self {
        self.base_url_var = Some(var.into());
        self
    }
}

/// Fills provider credentials missing from configuration with the
/// conventional environment variables.
pub struct EnvCredentialProvider {
    mappings: HashMap<ProviderKind, EnvMapping>,
    lookup: Lookup,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self {
            mappings: HashMap::new(),
            lookup: Arc::new(|name| env::var(name).ok()),
        }
    }

    pub fn with_mapping(mut self, kind: ProviderKind, mapping: EnvMapping) -> Self {
        self.mappings.insert(kind, mapping);
        self
    }

    /// Replace the variable source, e.g. with a fixed map in tests
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }

    pub fn with_defaults(self) -> Self {
        self.with_mapping(
            ProviderKind::OpenAi,
            EnvMapping::new("OPENAI_API_KEY").with_base_url_var("OPENAI_BASE_URL"),
        )
        .with_mapping(
            ProviderKind::Anthropic,
            EnvMapping::new("ANTHROPIC_API_KEY").with_base_url_var("ANTHROPIC_BASE_URL"),
        )
    }

    /// Read the API key for `kind`, ignoring empty values
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        let mapping = self.mappings.get(&kind)?;
        self.read(&mapping.api_key_var)
    }

    pub fn base_url(&self, kind: ProviderKind) -> Option<String> {
        let var = self.mappings.get(&kind)?.base_url_var.as_deref()?;
        self.read(var)
    }

    /// Fill unset keys and base URLs. Values already present in
    /// configuration win.
    pub fn apply(&self, providers: &mut ProvidersConfig) {
        for kind in ProviderKind::ALL {
            let settings = providers.settings_mut(kind);

            if settings.api_key().is_none() {
                if let Some(key) = self.api_key(kind) {
                    debug!(provider = %kind, "Using API key from environment");
                    settings.api_key = Some(key);
                }
            }

            if settings.base_url.is_none() {
                settings.base_url = self.base_url(kind);
            }
        }
    }

    fn read(&self, var: &str) -> Option<String> {
        (self.lookup)(var).filter(|value| !value.trim().is_empty())
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new().with_defaults()
    }
}

impl fmt::Debug for EnvCredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentialProvider")
            .field("mappings", &self.mappings)
            .finish_non_exhaustive()
    }
}
