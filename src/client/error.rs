use thiserror::Error;

/// Errors seen by a relay caller. Every variant ends the request.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Relay returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The body ended abnormally after `partial` had been received
    #[error("Stream interrupted: {message}")]
    Interrupted { partial: String, message: String },

    #[error("Invalid relay URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn interrupted(partial: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Interrupted {
            partial: partial.into(),
            message: message.into(),
        }
    }

    /// Text received before the failure, if any
    pub fn partial_content(&self) -> Option<&str> {
        match self {
            Self::Interrupted { partial, .. } if !partial.is_empty() => Some(partial),
            _ => None,
        }
    }
}
