//! Provider selection and generation parameters

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Upstream LLM vendors the relay can forward to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Anthropic];

    /// Wire identifier used in request configs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }

    /// Human readable vendor name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
        }
    }

    /// Model used when a request does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-3-opus-20240229",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(DomainError::validation(format!("Unsupported provider: {}", s))),
        }
    }
}

/// Generation configuration as supplied by a caller. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Parse the provider tag; an absent tag selects the primary provider.
    pub fn provider_kind(&self) -> Result<ProviderKind, DomainError> {
        match self.provider.as_deref() {
            None => Ok(ProviderKind::default()),
            Some(name) => name.parse(),
        }
    }
}

/// Generation parameters with every default applied
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationSettings {
    /// Apply defaults to `config` for an already selected provider.
    pub fn resolve(
        provider: ProviderKind,
        config: &GenerationConfig,
        default_model: &str,
    ) -> Result<Self, DomainError> {
        let model = match config.model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model.to_string(),
            _ => default_model.to_string(),
        };

        let temperature = config.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !temperature.is_finite() || !(0.0..=1.0).contains(&temperature) {
            return Err(DomainError::validation(format!(
                "temperature must be between 0 and 1, got {}",
                temperature
            )));
        }

        let max_tokens = config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(DomainError::validation("max_tokens must be positive"));
        }

        Ok(Self {
            provider,
            model,
            temperature,
            max_tokens,
        })
    }
}
