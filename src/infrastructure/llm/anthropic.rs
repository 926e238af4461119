use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client::HttpClientTrait;
use super::sse::{sse_events, SseEvent};
use crate::domain::{
    DomainError, FinishReason, LlmProvider, LlmRequest, LlmStream, ProviderKind, StreamChunk, Turn,
    TurnRole,
};

pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
#[derive(Debug)]
pub struct AnthropicProvider<C: HttpClientTrait> {
    client: C,
    api_key: String,
    base_url: String,
}

impl<C: HttpClientTrait> AnthropicProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_ANTHROPIC_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            api_key: api_key.into(),
            base_url,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_request(&self, request: &LlmRequest) -> serde_json::Value {
        let (system, messages) = split_system_turns(&request.messages);

        let anthropic_messages: Vec<AnthropicMessage> =
            messages.into_iter().map(AnthropicMessage::from_domain).collect();

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": anthropic_messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "stream": true,
        });

        if let Some(system_content) = system {
            body["system"] = serde_json::json!(system_content);
        }

        body
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", ANTHROPIC_VERSION),
            ("Content-Type", "application/json"),
        ]
    }
}

/// Lift system turns out of the message list; the Messages API only accepts
/// them in the top-level `system` field.
fn split_system_turns(turns: &[Turn]) -> (Option<String>, Vec<&Turn>) {
    let mut system_content = String::new();
    let mut other_turns = Vec::new();

    for turn in turns {
        if turn.role == TurnRole::System {
            if !system_content.is_empty() {
                system_content.push('\n');
            }
            system_content.push_str(&turn.content);
        } else {
            other_turns.push(turn);
        }
    }

    let system = if system_content.is_empty() {
        None
    } else {
        Some(system_content)
    };

    (system, other_turns)
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for AnthropicProvider<C> {
    async fn chat_stream(&self, request: LlmRequest) -> Result<LlmStream, DomainError> {
        let url = self.messages_url();
        let body = self.build_request(&request);
        let byte_stream = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        let mut events = sse_events(byte_stream);

        Ok(Box::pin(stream! {
            let mut stop_reason = None;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                match decode_event(&event) {
                    AnthropicEvent::Text(text) => yield Ok(StreamChunk::text(text)),
                    AnthropicEvent::StopReason(reason) => stop_reason = Some(reason),
                    AnthropicEvent::MessageStop => {
                        let reason = stop_reason.take().unwrap_or(FinishReason::Stop);
                        yield Ok(StreamChunk::finished(reason));
                    }
                    AnthropicEvent::Error(message) => {
                        yield Err(DomainError::provider("anthropic", message));
                        return;
                    }
                    AnthropicEvent::Ignored => {}
                }
            }
        }))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }
}

#[derive(Debug, PartialEq)]
enum AnthropicEvent {
    Text(String),
    StopReason(FinishReason),
    MessageStop,
    Error(String),
    Ignored,
}

fn decode_event(event: &SseEvent) -> AnthropicEvent {
    let payload: AnthropicStreamEvent = match serde_json::from_str(&event.data) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Skipping unparseable Anthropic stream event");
            return AnthropicEvent::Ignored;
        }
    };

    match payload.event_type.as_str() {
        "content_block_delta" => match payload.delta {
            Some(StreamDelta {
                delta_type,
                text: Some(text),
                ..
            }) if delta_type == "text_delta" && !text.is_empty() => AnthropicEvent::Text(text),
            _ => AnthropicEvent::Ignored,
        },
        "message_delta" => match payload.delta.and_then(|d| d.stop_reason) {
            Some(reason) => AnthropicEvent::StopReason(parse_stop_reason(&reason)),
            None => AnthropicEvent::Ignored,
        },
        "message_stop" => AnthropicEvent::MessageStop,
        "error" => AnthropicEvent::Error(
            payload
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "stream error".to_string()),
        ),
        _ => AnthropicEvent::Ignored,
    }
}

fn parse_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

// Anthropic API types

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> AnthropicMessage<'a> {
    fn from_domain(turn: &'a Turn) -> Self {
        let role = match turn.role {
            TurnRole::Assistant => "assistant",
            // System turns are lifted out before this point
            TurnRole::User | TurnRole::System => "user",
        };

        Self {
            role,
            content: &turn.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicStreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<StreamDelta>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(rename = "type", default)]
    delta_type: String,
    text: Option<String>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: Option<String>,
}
