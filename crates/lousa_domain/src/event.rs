use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ConversationId, FileId, Message, MessageId, ProjectId, SourceRef, VersionStatus};

/// Progress stage of a streaming query, emitted in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStage {
    Validating,
    Conversation,
    Memory,
    Embedding,
    Search,
    Generating,
    Saving,
    Completed,
}

impl SessionStage {
    pub fn message(&self) -> &'static str {
        match self {
            SessionStage::Validating => "Validando projeto...",
            SessionStage::Conversation => "Preparando conversa...",
            SessionStage::Memory => "Recuperando memória da conversa...",
            SessionStage::Embedding => "Processando pergunta...",
            SessionStage::Search => "Buscando nos documentos...",
            SessionStage::Generating => "Gerando resposta...",
            SessionStage::Saving => "Salvando resposta...",
            SessionStage::Completed => "Concluído",
        }
    }
}

/// Truncated view of a retrieval hit sent before streaming starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePreview {
    pub filename: String,
    pub content: String,
    pub score: f32,
}

/// Server-to-client events of the streaming session. Each event is a
/// self-describing frame on the channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Status {
        stage: SessionStage,
        message: String,
    },
    ConversationCreated {
        id: ConversationId,
        title: String,
    },
    UserMessage {
        message: Message,
    },
    StreamStart {
        sources_preview: Vec<SourcePreview>,
    },
    StreamChunk {
        content: String,
        full_content: String,
    },
    StreamComplete {
        message_id: MessageId,
        content: String,
        tokens_used: u32,
        sources: Vec<SourceRef>,
    },
    ConversationList {
        conversations: Vec<ConversationSummary>,
    },
    ConversationLoaded {
        id: ConversationId,
        messages: Vec<Message>,
    },
    Error {
        message: String,
    },
}

impl SessionEvent {
    pub fn status(stage: SessionStage) -> Self {
        Self::Status { stage, message: stage.message().to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub message_count: usize,
}

/// Client-to-server events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Start {
        project_id: ProjectId,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
    },
    ListConversations {
        project_id: ProjectId,
    },
    LoadConversation {
        conversation_id: ConversationId,
    },
}

/// Out-of-band progress of a file-generation job, addressed to the owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationProgress {
    pub owner_id: Uuid,
    pub file_id: FileId,
    pub version: u32,
    pub status: VersionStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let fixture = SessionEvent::status(SessionStage::Embedding);

        let actual = serde_json::to_value(&fixture).unwrap();
        let expected = serde_json::json!({
            "type": "status",
            "stage": "embedding",
            "message": "Processando pergunta...",
        });
        assert_eq!(actual, expected);
    }

    #[test]
    fn client_start_deserializes_without_conversation() {
        let project_id = ProjectId::generate();
        let fixture = serde_json::json!({
            "type": "start",
            "project_id": project_id,
            "message": "oi",
        });

        let actual: ClientEvent = serde_json::from_value(fixture).unwrap();
        match actual {
            ClientEvent::Start { conversation_id, .. } => assert_eq!(conversation_id, None),
            _ => panic!("expected start event"),
        }
    }
}
