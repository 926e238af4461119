use serde::{Deserialize, Serialize};

/// Reason why the generation finished
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other,
}

/// Streaming chunk from an LLM provider.
///
/// A chunk carries a text delta, a finish signal, or both. Deltas concatenate
/// in arrival order; their boundaries carry no meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(delta: impl Into<String>) -> Self {
        Self::new().with_delta(delta)
    }

    pub fn finished(reason: FinishReason) -> Self {
        Self::new().with_finish_reason(reason)
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk() {
        let chunk = StreamChunk::text("Hel");
        assert_eq!(chunk.delta.as_deref(), Some("Hel"));
        assert!(!chunk.is_final());
    }

    #[test]
    fn test_final_chunk() {
        let chunk = StreamChunk::text("!").with_finish_reason(FinishReason::Length);
        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Length));
    }
}
