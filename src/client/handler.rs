//! Callback adapter over [`CompletionStream`]

use futures::StreamExt;

use super::error::ClientError;
use super::stream::{CompletedResponse, CompletionEvent, CompletionStream};

/// Receives the events of one request.
///
/// `on_token` is called zero or more times, then exactly one of
/// `on_complete` or `on_error`.
pub trait CompletionHandler: Send {
    fn on_token(&mut self, token: &str);
    fn on_complete(&mut self, response: CompletedResponse);
    fn on_error(&mut self, error: ClientError);
}

/// Drive `stream` to its end, forwarding every event to `handler`
pub async fn drive<H>(mut stream: CompletionStream, handler: &mut H)
where
    H: CompletionHandler + ?Sized,
{
    while let Some(event) = stream.next().await {
        match event {
            Ok(CompletionEvent::Token(token)) => handler.on_token(&token),
            Ok(CompletionEvent::Complete(response)) => {
                handler.on_complete(response);
                return;
            }
            Err(error) => {
                handler.on_error(error);
                return;
            }
        }
    }
}
