use super::{GenerationSettings, Turn, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};

/// A fully resolved streaming completion request for one provider
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Turn>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl LlmRequest {
    pub fn new(messages: Vec<Turn>, settings: GenerationSettings) -> Self {
        Self {
            model: settings.model,
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn builder(model: impl Into<String>) -> LlmRequestBuilder {
        LlmRequestBuilder::new(model)
    }
}

/// Builder for LlmRequest
#[derive(Debug)]
pub struct LlmRequestBuilder {
    model: String,
    messages: Vec<Turn>,
    temperature: f64,
    max_tokens: u32,
}

impl LlmRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn message(mut self, turn: Turn) -> Self {
        self.messages.push(turn);
        self
    }

    pub fn system(self, content: impl Into<String>) -> Self {
        self.message(Turn::system(content))
    }

    pub fn user(self, content: impl Into<String>) -> Self {
        self.message(Turn::user(content))
    }

    pub fn assistant(self, content: impl Into<String>) -> Self {
        self.message(Turn::assistant(content))
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn build(self) -> LlmRequest {
        LlmRequest {
            model: self.model,
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
