use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, ProjectId, SourceRef};

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn into_string(&self) -> String {
        self.0.to_string()
    }

    pub fn parse(value: impl ToString) -> Result<Self, Error> {
        Ok(Self(
            Uuid::parse_str(&value.to_string()).map_err(Error::InvalidId)?,
        ))
    }
}

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// An ongoing chat inside a project. Messages are owned by the conversation
/// and totally ordered by insertion.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Conversation {
    pub id: ConversationId,
    pub project_id: ProjectId,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            id: ConversationId::generate(),
            project_id,
            title: None,
            created_at: Utc::now(),
        }
    }

    /// Derives the auto-title used when a streaming session opens a fresh
    /// conversation from the first user message.
    pub fn title_from_message(message: &str) -> String {
        let prefix: String = message.chars().take(50).collect();
        format!("Chat: {prefix}...")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Metadata recorded on assistant messages: token usage and the retrieval
/// sources the answer was grounded in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct MessageMeta {
    pub tokens_used: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<MessageMeta>,
}

impl Message {
    pub fn user(conversation_id: ConversationId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            role: MessageRole::User,
            content: content.into(),
            created_at: Utc::now(),
            meta: None,
        }
    }

    pub fn assistant(
        conversation_id: ConversationId,
        content: impl Into<String>,
        meta: MessageMeta,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            conversation_id,
            role: MessageRole::Assistant,
            content: content.into(),
            created_at: Utc::now(),
            meta: Some(meta),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn title_truncates_to_fifty_chars() {
        let fixture = "a".repeat(80);

        let actual = Conversation::title_from_message(&fixture);
        let expected = format!("Chat: {}...", "a".repeat(50));
        assert_eq!(actual, expected);
    }

    #[test]
    fn title_keeps_short_messages_whole() {
        let actual = Conversation::title_from_message("O que e fotossintese?");
        let expected = "Chat: O que e fotossintese?...";
        assert_eq!(actual, expected);
    }

    #[test]
    fn assistant_message_carries_meta() {
        let conversation = Conversation::new(ProjectId::generate());
        let fixture = Message::assistant(conversation.id, "resposta", MessageMeta::default());

        let actual = fixture.meta.is_some();
        assert_eq!(actual, true);
    }
}
