use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::MessageRole;

/// Estimates token count with the 1 token ~= 4 characters heuristic.
pub fn estimate_tokens(text: &str) -> u32 {
    text.chars().count().div_ceil(4) as u32
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// One (role, content) item of an LLM-ready message list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }

    pub fn token_count_approx(&self) -> u32 {
        estimate_tokens(&self.content)
    }
}

/// A request to the chat model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self { messages, max_tokens: None, temperature: None }
    }

    pub fn add_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }
}

/// Token accounting as reported by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Setters)]
#[setters(into)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete (non-streaming) chat model response.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Usage,
}

impl ChatCompletion {
    pub fn new(content: impl Into<String>, usage: Usage) -> Self {
        Self { content: content.into(), usage }
    }

    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// One incremental content delta of a streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatDelta {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: content.into(), usage: None }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn estimate_rounds_up() {
        let actual = (estimate_tokens(""), estimate_tokens("abc"), estimate_tokens("abcd"));
        let expected = (0, 1, 1);
        assert_eq!(actual, expected);
    }

    #[test]
    fn estimate_counts_chars_not_bytes() {
        // four multi-byte characters estimate to a single token
        let actual = estimate_tokens("ação");
        let expected = 1;
        assert_eq!(actual, expected);
    }

    #[test]
    fn message_roles_map_from_stored_roles() {
        let actual = (
            ChatRole::from(MessageRole::User),
            ChatRole::from(MessageRole::Assistant),
        );
        let expected = (ChatRole::User, ChatRole::Assistant);
        assert_eq!(actual, expected);
    }
}
