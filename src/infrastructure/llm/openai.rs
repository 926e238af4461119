use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http_client::HttpClientTrait;
use super::sse::{sse_events, SseEvent};
use crate::domain::{
    DomainError, FinishReason, LlmProvider, LlmRequest, LlmStream, ProviderKind, StreamChunk, Turn,
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// OpenAI chat completions provider
#[derive(Debug)]
pub struct OpenAiProvider<C: HttpClientTrait> {
    client: C,
    auth_header: String,
    base_url: String,
}

impl<C: HttpClientTrait> OpenAiProvider<C> {
    pub fn new(client: C, api_key: impl Into<String>) -> Self {
        Self::with_base_url(client, api_key, DEFAULT_OPENAI_BASE_URL)
    }

    pub fn with_base_url(
        client: C,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let auth_header = format!("Bearer {}", api_key.into());
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            client,
            auth_header,
            base_url,
        }
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn build_request(&self, request: &LlmRequest) -> serde_json::Value {
        let messages: Vec<OpenAiMessage> =
            request.messages.iter().map(OpenAiMessage::from_domain).collect();

        serde_json::json!({
            "model": request.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": true,
        })
    }

    fn headers(&self) -> Vec<(&str, &str)> {
        vec![
            ("Authorization", self.auth_header.as_str()),
            ("Content-Type", "application/json"),
        ]
    }
}

#[async_trait]
impl<C: HttpClientTrait> LlmProvider for OpenAiProvider<C> {
    async fn chat_stream(&self, request: LlmRequest) -> Result<LlmStream, DomainError> {
        let url = self.chat_completions_url();
        let body = self.build_request(&request);
        let byte_stream = self
            .client
            .post_json_stream(&url, self.headers(), &body)
            .await?;

        let mut events = sse_events(byte_stream);

        Ok(Box::pin(stream! {
            let mut finished = false;

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                };

                match decode_event(&event) {
                    OpenAiEvent::Chunk(chunk) => {
                        finished |= chunk.is_final();
                        yield Ok(chunk);
                    }
                    OpenAiEvent::Done => {
                        if !finished {
                            finished = true;
                            yield Ok(StreamChunk::finished(FinishReason::Stop));
                        }
                    }
                    OpenAiEvent::Error(message) => {
                        yield Err(DomainError::provider("openai", message));
                        return;
                    }
                    OpenAiEvent::Ignored => {}
                }
            }
        }))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

#[derive(Debug, PartialEq)]
enum OpenAiEvent {
    Chunk(StreamChunk),
    Done,
    Error(String),
    Ignored,
}

fn decode_event(event: &SseEvent) -> OpenAiEvent {
    let data = event.data.trim();

    if data == "[DONE]" {
        return OpenAiEvent::Done;
    }

    let payload: OpenAiStreamPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Skipping unparseable OpenAI stream event");
            return OpenAiEvent::Ignored;
        }
    };

    if let Some(error) = payload.error {
        return OpenAiEvent::Error(error.message.unwrap_or_else(|| "stream error".to_string()));
    }

    let Some(choice) = payload.choices.into_iter().next() else {
        return OpenAiEvent::Ignored;
    };

    let mut chunk = StreamChunk::new();

    if let Some(content) = choice.delta.and_then(|d| d.content) {
        if !content.is_empty() {
            chunk = chunk.with_delta(content);
        }
    }

    if let Some(reason) = choice.finish_reason {
        chunk = chunk.with_finish_reason(parse_finish_reason(&reason));
    }

    if chunk.delta.is_none() && chunk.finish_reason.is_none() {
        return OpenAiEvent::Ignored;
    }

    OpenAiEvent::Chunk(chunk)
}

fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        _ => FinishReason::Other,
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
struct OpenAiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

impl<'a> OpenAiMessage<'a> {
    fn from_domain(turn: &'a Turn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: &turn.content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamPayload {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    error: Option<OpenAiStreamError>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamError {
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::llm::http_client::mock::MockHttpClient;
    use bytes::Bytes;

    const TEST_URL: &str = "https://api.openai.com/v1/chat/completions";

    fn sse(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    fn chunk(content: &str) -> String {
        format!(
            "data: {{\"id\":\"chatcmpl-1\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}},\"finish_reason\":null}}]}}\n\n",
            serde_json::to_string(content).unwrap()
        )
    }

    #[test]
    fn test_decode_content_delta() {
        let event = sse(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#);
        assert_eq!(decode_event(&event), OpenAiEvent::Chunk(StreamChunk::text("Hel")));
    }

    #[test]
    fn test_decode_role_only_delta_is_ignored() {
        let event = sse(r#"{"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#);
        assert_eq!(decode_event(&event), OpenAiEvent::Ignored);
    }

    #[test]
    fn test_decode_finish_reason() {
        let event = sse(r#"{"choices":[{"delta":{},"finish_reason":"length"}]}"#);
        assert_eq!(
            decode_event(&event),
            OpenAiEvent::Chunk(StreamChunk::finished(FinishReason::Length))
        );
    }

    #[test]
    fn test_decode_unrecognized_shapes() {
        assert_eq!(decode_event(&sse("not json")), OpenAiEvent::Ignored);
        assert_eq!(decode_event(&sse(r#"{"choices":[]}"#)), OpenAiEvent::Ignored);
        assert_eq!(decode_event(&sse(r#"{"usage":{"total_tokens":3}}"#)), OpenAiEvent::Ignored);
        assert_eq!(decode_event(&sse("[DONE]")), OpenAiEvent::Done);
    }

    #[test]
    fn test_decode_error_payload() {
        let event = sse(r#"{"error":{"message":"overloaded"}}"#);
        assert_eq!(decode_event(&event), OpenAiEvent::Error("overloaded".to_string()));
    }

    #[tokio::test]
    async fn test_openai_stream() {
        let body = format!("{}{}{}data: [DONE]\n\n", chunk("Hel"), chunk("lo, "), chunk("world"));
        let client = MockHttpClient::new()
            .with_stream_response(TEST_URL, vec![Bytes::from(body)]);
        let provider = OpenAiProvider::new(client, "sk-test");

        let request = LlmRequest::builder("gpt-4o").user("hello").build();
        let chunks: Vec<StreamChunk> = provider
            .chat_stream(request)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        let text: String = chunks.iter().filter_map(|c| c.delta.clone()).collect();
        assert_eq!(text, "Hello, world");
        assert_eq!(chunks.last().unwrap().finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_openai_stream_event_split_across_chunks() {
        let body = format!("{}data: [DONE]\n\n", chunk("split"));
        let (head, tail) = body.split_at(30);
        let client = MockHttpClient::new().with_stream_response(
            TEST_URL,
            vec![Bytes::from(head.to_string()), Bytes::from(tail.to_string())],
        );
        let provider = OpenAiProvider::new(client, "sk-test");

        let request = LlmRequest::builder("gpt-4o").user("hello").build();
        let chunks: Vec<StreamChunk> = provider
            .chat_stream(request)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(chunks[0].delta.as_deref(), Some("split"));
    }

    #[tokio::test]
    async fn test_openai_request_body() {
        let client = MockHttpClient::new().with_stream_response(TEST_URL, vec![]);
        let provider = OpenAiProvider::new(client, "sk-test");

        let request = LlmRequest::builder("gpt-4o")
            .system("Be terse")
            .user("hello")
            .temperature(0.0)
            .max_tokens(64)
            .build();
        let _ = provider.chat_stream(request).await.unwrap();

        let body = &provider.client.bodies()[0];
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
    }

    #[tokio::test]
    async fn test_openai_request_failure() {
        let client = MockHttpClient::new().with_error(TEST_URL, "HTTP 401: invalid key");
        let provider = OpenAiProvider::new(client, "bad-key");

        let request = LlmRequest::builder("gpt-4o").user("hello").build();
        assert!(provider.chat_stream(request).await.is_err());
    }

    #[tokio::test]
    async fn test_openai_custom_base_url() {
        let custom_url = "http://localhost:8080/v1/chat/completions";
        let client = MockHttpClient::new()
            .with_stream_response(custom_url, vec![Bytes::from(chunk("custom"))]);
        let provider = OpenAiProvider::with_base_url(client, "sk-test", "http://localhost:8080/");

        let request = LlmRequest::builder("gpt-4o").user("hello").build();
        let first = provider
            .chat_stream(request)
            .await
            .unwrap()
            .next()
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.delta.as_deref(), Some("custom"));
    }
}
