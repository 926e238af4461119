//! Relay request and provider listing types

use serde::{Deserialize, Serialize};

use crate::domain::{GenerationConfig, ProviderStatus, Turn};

/// Body of `POST /api/{session_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub messages: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<GenerationConfig>,
}

/// Body of `GET /providers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvidersResponse {
    pub default_provider: String,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    pub name: String,
    pub available: bool,
    pub default_model: String,
}

impl From<ProviderStatus> for ProviderInfo {
    fn from(status: ProviderStatus) -> Self {
        Self {
            id: status.kind.as_str().to_string(),
            name: status.kind.display_name().to_string(),
            available: status.available,
            default_model: status.default_model,
        }
    }
}
