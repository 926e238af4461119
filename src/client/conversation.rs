//! Per-window chat history and turn building

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Turn;

/// Who produced a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    /// Synthetic greeting shown before any model output; never sent upstream
    Welcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content)
    }

    pub fn welcome(content: impl Into<String>) -> Self {
        Self::new(Sender::Welcome, content)
    }

    fn to_turn(&self) -> Option<Turn> {
        match self.sender {
            Sender::User => Some(Turn::user(&self.content)),
            Sender::Assistant => Some(Turn::assistant(&self.content)),
            Sender::Welcome => None,
        }
    }
}

/// The state of one chat window
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }
}

/// System prompt, then the history without welcome entries, then the new
/// user text.
pub fn build_turns(user_text: &str, history: &[ChatMessage], system_prompt: &str) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(history.len() + 2);
    turns.push(Turn::system(system_prompt));
    turns.extend(history.iter().filter_map(ChatMessage::to_turn));
    turns.push(Turn::user(user_text));
    turns
}
