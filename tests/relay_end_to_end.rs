//! Runs the relay on an ephemeral port against mocked upstream providers and
//! drives it with the caller-side client.

use std::net::SocketAddr;

use futures::StreamExt;
use terminal_relay::api::{create_app_router, AppState};
use terminal_relay::client::{
    ChatMessage, ChatProvider, ClientError, CompletionEvent, CompletionRequest, RelayClient,
};
use terminal_relay::config::{ProviderSettings, ProvidersConfig, ServerConfig};
use terminal_relay::domain::GenerationConfig;
use terminal_relay::infrastructure::llm::LlmProviderFactory;
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(upstream: &MockServer) -> ProviderSettings {
    ProviderSettings {
        api_key: Some("test-key".to_string()),
        base_url: Some(upstream.uri()),
        default_model: None,
    }
}

async fn start_relay(providers: ProvidersConfig) -> SocketAddr {
    let registry = LlmProviderFactory::build_registry(&providers).unwrap();
    let app = create_app_router(AppState::new(registry), &ServerConfig::default(), None);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

fn request(user_text: &str) -> CompletionRequest {
    CompletionRequest {
        session_id: "window-1".to_string(),
        user_text: user_text.to_string(),
        history: vec![ChatMessage::welcome("READY.")],
        system_prompt: "You are a retro terminal".to_string(),
        config: GenerationConfig::default(),
    }
}

fn openai_sse(fragments: &[&str]) -> String {
    let mut body = String::new();
    for fragment in fragments {
        body.push_str(&format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": fragment}, "finish_reason": null}]})
        ));
    }
    body.push_str("data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n");
    body.push_str("data: [DONE]\n\n");
    body
}

fn anthropic_sse(fragments: &[&str], finished: bool) -> String {
    let mut body = String::from(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
    );
    for fragment in fragments {
        body.push_str(&format!(
            "event: content_block_delta\ndata: {}\n\n",
            serde_json::json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": fragment}})
        ));
    }
    if finished {
        body.push_str("event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n\n");
        body.push_str("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n");
    }
    body
}

#[tokio::test]
async fn openai_stream_reaches_the_client_in_order() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({
            "model": "gpt-4o",
            "temperature": 0.7,
            "max_tokens": 1000,
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(openai_sse(&["Hel", "lo, ", "wörld"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = start_relay(ProvidersConfig {
        openai: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let events: Vec<_> = ChatProvider::OpenAi
        .stream_completion(&client, request("hello"))
        .collect()
        .await;

    let tokens: String = events
        .iter()
        .filter_map(|e| match e {
            Ok(CompletionEvent::Token(t)) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(tokens, "Hello, wörld");

    let completes: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Ok(CompletionEvent::Complete(response)) => Some(response),
            _ => None,
        })
        .collect();
    assert_eq!(completes.len(), 1);
    assert_eq!(completes[0].content, "Hello, wörld");
    assert!(matches!(events.last(), Some(Ok(CompletionEvent::Complete(_)))));
}

#[tokio::test]
async fn anthropic_receives_system_prompt_and_streams_back() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(serde_json::json!({
            "model": "claude-3-opus-20240229",
            "system": "You are a retro terminal",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": true
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(anthropic_sse(&["HELLO", " THERE"], true), "text/event-stream"),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let addr = start_relay(ProvidersConfig {
        anthropic: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let response = ChatProvider::Anthropic
        .stream_completion(&client, request("hello"))
        .collect_response()
        .await
        .unwrap();

    assert_eq!(response.content, "HELLO THERE");
    assert!(response.is_complete);
}

#[tokio::test]
async fn missing_credentials_surface_as_status_error() {
    let upstream = MockServer::start().await;
    let addr = start_relay(ProvidersConfig {
        openai: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let result = ChatProvider::Anthropic
        .stream_completion(&client, request("hello"))
        .collect_response()
        .await;

    match result {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Anthropic API key not configured");
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let listing = client.providers().await.unwrap();
    assert!(listing.providers.iter().any(|p| p.id == "openai" && p.available));
    assert!(listing.providers.iter().any(|p| p.id == "anthropic" && !p.available));
}

#[tokio::test]
async fn upstream_rejection_is_a_generic_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&upstream)
        .await;

    let addr = start_relay(ProvidersConfig {
        openai: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let result = ChatProvider::OpenAi
        .stream_completion(&client, request("hello"))
        .collect_response()
        .await;

    match result {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to generate response");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn truncated_upstream_is_reported_as_interrupted() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(anthropic_sse(&["PARTIAL"], false), "text/event-stream"),
        )
        .mount(&upstream)
        .await;

    let addr = start_relay(ProvidersConfig {
        anthropic: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let events: Vec<_> = ChatProvider::Anthropic
        .stream_completion(&client, request("hello"))
        .collect()
        .await;

    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Ok(CompletionEvent::Complete(_))))
    );
    // Bytes queued before the abort may or may not reach the client
    match events.last() {
        Some(Err(ClientError::Interrupted { partial, .. })) => {
            assert!("PARTIAL".starts_with(partial.as_str()))
        }
        Some(Err(ClientError::Request(_))) => {}
        other => panic!("unexpected final event: {:?}", other),
    }
}

#[tokio::test]
async fn upstream_error_event_before_text_is_a_status_error() {
    let upstream = MockServer::start().await;
    let body = concat!(
        "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\n",
        "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&upstream)
        .await;

    let addr = start_relay(ProvidersConfig {
        anthropic: settings(&upstream),
        ..Default::default()
    })
    .await;
    let client = RelayClient::new(&format!("http://{}", addr)).unwrap();

    let result = ChatProvider::Anthropic
        .stream_completion(&client, request("hello"))
        .collect_response()
        .await;

    match result {
        Err(ClientError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Failed to generate response");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}
