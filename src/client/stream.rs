//! Incremental decoding of a relay response body into completion events

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_stream::stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use uuid::Uuid;

use super::error::ClientError;

/// Final result of a successful request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedResponse {
    pub content: String,
    pub id: Uuid,
    pub is_complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    Token(String),
    Complete(CompletedResponse),
}

/// UTF-8 decoder that carries incomplete sequences over to the next chunk
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` as possible. Invalid bytes become U+FFFD.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));

                    match e.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + invalid);
                        }
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flush bytes left at end of input
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }

        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

type EventStream = Pin<Box<dyn Stream<Item = Result<CompletionEvent, ClientError>> + Send>>;

/// Tokens of one request, then exactly one terminal item.
///
/// After `Complete` or an error the stream yields `None`. Dropping it cancels
/// the request.
pub struct CompletionStream {
    inner: EventStream,
}

impl CompletionStream {
    pub(crate) fn new(inner: EventStream) -> Self {
        Self { inner }
    }

    /// Decode a relay body. A read error ends the stream with
    /// [`ClientError::Interrupted`] carrying the text received so far.
    pub fn from_body<S, E>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self::new(Box::pin(decode_body(body)))
    }

    /// Drive the stream to the end, discarding tokens
    pub async fn collect_response(mut self) -> Result<CompletedResponse, ClientError> {
        while let Some(event) = self.next().await {
            if let CompletionEvent::Complete(response) = event? {
                return Ok(response);
            }
        }

        Err(ClientError::interrupted("", "stream ended without a result"))
    }
}

impl Stream for CompletionStream {
    type Item = Result<CompletionEvent, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream").finish_non_exhaustive()
    }
}

fn decode_body<S, E>(body: S) -> impl Stream<Item = Result<CompletionEvent, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    stream! {
        let mut body = Box::pin(body);
        let mut decoder = Utf8Decoder::new();
        let mut content = String::new();

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    let text = decoder.decode(&bytes);
                    if !text.is_empty() {
                        content.push_str(&text);
                        yield Ok(CompletionEvent::Token(text));
                    }
                }
                Err(e) => {
                    content.push_str(&decoder.finish());
                    yield Err(ClientError::interrupted(content, e.to_string()));
                    return;
                }
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            content.push_str(&rest);
            yield Ok(CompletionEvent::Token(rest));
        }

        yield Ok(CompletionEvent::Complete(CompletedResponse {
            content,
            id: Uuid::new_v4(),
            is_complete: true,
        }));
    }
}
