//! Stream relay endpoint
//!
//! `POST /api/{session_id}` forwards a conversation to the selected upstream
//! provider and writes every text delta to the response body as soon as it
//! is decoded.

use std::time::Instant;

use async_stream::stream;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::state::AppState;
use super::types::{ApiError, Json, RelayRequest};
use crate::domain::{DomainError, GenerationSettings, LlmRequest, LlmStream};
use crate::infrastructure::observability::{record_relay_request, RelayOutcome};

/// Handle a relay request
pub async fn relay_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<RelayRequest>,
) -> Result<Response, ApiError> {
    let config = request.config.unwrap_or_default();
    let kind = config.provider_kind()?;

    if request.messages.is_empty() {
        return Err(DomainError::validation("Messages cannot be empty").into());
    }

    let settings =
        GenerationSettings::resolve(kind, &config, state.providers.default_model(kind))?;
    let provider = state.providers.resolve(kind)?;

    info!(
        session_id = %session_id,
        provider = %kind,
        model = %settings.model,
        messages = request.messages.len(),
        "Relaying chat request"
    );

    let start = Instant::now();
    let mut tracker = RelayTracker::new(session_id, &settings, start);
    let mut upstream = match provider
        .chat_stream(LlmRequest::new(request.messages, settings))
        .await
    {
        Ok(upstream) => upstream,
        Err(e) => {
            tracker.finish(RelayOutcome::Failed);
            return Err(e.into());
        }
    };

    let opening = match first_output(&mut upstream).await {
        Ok(opening) => opening,
        Err(e) => {
            warn!(session_id = %tracker.session_id, error = %e, "Upstream failed before any output");
            tracker.finish(RelayOutcome::Failed);
            return Err(e.into());
        }
    };

    if let Some(ref delta) = opening.delta {
        tracker.bytes += delta.len() as u64;
    }
    let body = Body::from_stream(relay_body(upstream, tracker, opening));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .body(body)
        .map_err(|e| ApiError::from(DomainError::internal(format!("Failed to build response: {}", e))))
}

/// What the upstream produced before the response status was committed
#[derive(Debug)]
struct Opening {
    delta: Option<String>,
    finished: bool,
}

/// Poll the upstream until its first text delta or its finish signal.
///
/// Failures up to this point still become a JSON error response. An upstream
/// that ends before either is a failure too.
async fn first_output(upstream: &mut LlmStream) -> Result<Opening, DomainError> {
    while let Some(item) = upstream.next().await {
        let chunk = item?;
        let finished = chunk.is_final();
        let delta = chunk.delta.filter(|d| !d.is_empty());

        if delta.is_some() || finished {
            return Ok(Opening { delta, finished });
        }
    }

    Err(DomainError::stream_interrupted(
        "upstream ended before producing any output",
    ))
}

/// Pass text deltas through as raw bytes, starting with the opening delta.
///
/// The upstream stream is polled by the body itself, so a dropped body drops
/// the upstream request. A failure, or an upstream end without a finish
/// signal, ends the body with an error and the connection is aborted instead
/// of completed.
fn relay_body(
    mut upstream: LlmStream,
    mut tracker: RelayTracker,
    opening: Opening,
) -> impl futures::Stream<Item = Result<Bytes, DomainError>> + Send + 'static {
    stream! {
        let mut finished = opening.finished;

        if let Some(delta) = opening.delta {
            yield Ok(Bytes::from(delta));
        }

        while let Some(item) = upstream.next().await {
            match item {
                Ok(chunk) => {
                    finished |= chunk.is_final();

                    if let Some(delta) = chunk.delta {
                        tracker.bytes += delta.len() as u64;
                        yield Ok(Bytes::from(delta));
                    }
                }
                Err(e) => {
                    warn!(session_id = %tracker.session_id, error = %e, "Upstream stream failed");
                    tracker.record(RelayOutcome::Interrupted);
                    yield Err(e);
                    return;
                }
            }
        }

        if finished {
            tracker.record(RelayOutcome::Completed);
        } else {
            warn!(session_id = %tracker.session_id, "Upstream ended without a completion signal");
            tracker.record(RelayOutcome::Interrupted);
            yield Err(DomainError::stream_interrupted(
                "upstream ended without a completion signal",
            ));
        }
    }
}

/// Records the relay metrics exactly once. Dropping it unfinished means the
/// caller disconnected.
struct RelayTracker {
    session_id: String,
    provider: &'static str,
    model: String,
    start: Instant,
    bytes: u64,
    recorded: bool,
}

impl RelayTracker {
    fn new(session_id: String, settings: &GenerationSettings, start: Instant) -> Self {
        Self {
            session_id,
            provider: settings.provider.as_str(),
            model: settings.model.clone(),
            start,
            bytes: 0,
            recorded: false,
        }
    }

    fn finish(mut self, outcome: RelayOutcome) {
        self.record(outcome);
    }

    fn record(&mut self, outcome: RelayOutcome) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        let duration = self.start.elapsed();
        record_relay_request(self.provider, &self.model, outcome, duration, self.bytes);
        debug!(
            session_id = %self.session_id,
            provider = self.provider,
            outcome = outcome.as_str(),
            bytes = self.bytes,
            duration_ms = duration.as_millis() as u64,
            "Relay finished"
        );
    }
}

impl Drop for RelayTracker {
    fn drop(&mut self) {
        self.record(RelayOutcome::Cancelled);
    }
}
