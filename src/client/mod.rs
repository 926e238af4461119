//! Caller side of the relay: conversation building, streaming completions
//! and the callback adapter used by chat windows.

mod conversation;
mod error;
mod handler;
mod provider;
mod stream;

pub use conversation::{build_turns, ChatMessage, ChatSession, Sender};
pub use error::ClientError;
pub use handler::{drive, CompletionHandler};
pub use provider::{ChatProvider, CompletionRequest, RelayClient};
pub use stream::{CompletedResponse, CompletionEvent, CompletionStream, Utf8Decoder};
