//! Relay client and the closed set of chat providers

use async_stream::stream;
use futures::StreamExt;
use reqwest::Url;
use tracing::debug;

use super::conversation::{build_turns, ChatMessage};
use super::error::ClientError;
use super::handler::{drive, CompletionHandler};
use super::stream::CompletionStream;
use crate::api::types::{ApiErrorResponse, ProvidersResponse, RelayRequest};
use crate::domain::{GenerationConfig, ProviderKind};

/// HTTP client for one relay instance
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    /// URL of the relay endpoint for one chat window
    pub fn session_url(&self, session_id: &str) -> Result<Url, ClientError> {
        self.url(&["api", session_id])
    }

    /// Availability of the relay's providers
    pub async fn providers(&self) -> Result<ProvidersResponse, ClientError> {
        let response = self.http.get(self.url(&["providers"])?).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(parsed) => parsed.error,
        Err(_) if !body.trim().is_empty() => body,
        Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
    };

    Err(ClientError::status(status.as_u16(), message))
}

/// Everything needed to ask for one completion
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub session_id: String,
    pub user_text: String,
    pub history: Vec<ChatMessage>,
    pub system_prompt: String,
    pub config: GenerationConfig,
}

/// The providers a chat window can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    OpenAi,
    Anthropic,
}

impl ChatProvider {
    pub fn from_kind(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::OpenAi => Self::OpenAi,
            ProviderKind::Anthropic => Self::Anthropic,
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi => ProviderKind::OpenAi,
            Self::Anthropic => ProviderKind::Anthropic,
        }
    }

    /// Start a completion. Nothing is sent until the stream is first polled.
    pub fn stream_completion(
        &self,
        client: &RelayClient,
        request: CompletionRequest,
    ) -> CompletionStream {
        let http = client.http.clone();
        let url = client.session_url(&request.session_id);
        let body = self.relay_request(request);
        let provider = self.kind();

        CompletionStream::new(Box::pin(stream! {
            let url = match url {
                Ok(url) => url,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            debug!(provider = %provider, url = %url, "Sending relay request");

            let response = match http.post(url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(ClientError::from(e));
                    return;
                }
            };

            let response = match check_status(response).await {
                Ok(response) => response,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut events = CompletionStream::from_body(response.bytes_stream());
            while let Some(event) = events.next().await {
                yield event;
            }
        }))
    }

    /// Callback form of [`ChatProvider::stream_completion`]
    pub async fn generate_completion<H>(
        &self,
        client: &RelayClient,
        request: CompletionRequest,
        handler: &mut H,
    ) where
        H: CompletionHandler + ?Sized,
    {
        drive(self.stream_completion(client, request), handler).await;
    }

    fn relay_request(&self, request: CompletionRequest) -> RelayRequest {
        let messages = build_turns(&request.user_text, &request.history, &request.system_prompt);
        let config = GenerationConfig {
            provider: Some(self.kind().as_str().to_string()),
            ..request.config
        };

        RelayRequest {
            messages,
            config: Some(config),
        }
    }
}
