use std::sync::Arc;

use anyhow::Context;
use lousa_domain::{
    Conversation, ConversationId, ConversationStore, ConversationSummary, Message, MessageMeta,
    ProjectId,
};

/// Conversation lifecycle on top of the relational store.
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Opens the conversation for a streaming turn: loads the given id, or
    /// creates a fresh one titled after the first message. The flag reports
    /// whether a conversation was created.
    pub async fn open(
        &self,
        project_id: &ProjectId,
        conversation_id: Option<ConversationId>,
        first_message: &str,
    ) -> anyhow::Result<(Conversation, bool)> {
        match conversation_id {
            Some(id) => {
                let conversation = self
                    .store
                    .find(&id)
                    .await?
                    .with_context(|| format!("Conversation {id} not found"))?;
                Ok((conversation, false))
            }
            None => {
                let conversation = Conversation::new(*project_id)
                    .title(Conversation::title_from_message(first_message));
                self.store.create(conversation.clone()).await?;
                Ok((conversation, true))
            }
        }
    }

    pub async fn list(&self, project_id: &ProjectId) -> anyhow::Result<Vec<ConversationSummary>> {
        let conversations = self.store.list_by_project(project_id).await?;
        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let message_count = self.store.messages(&conversation.id).await?.len();
            summaries.push(ConversationSummary {
                id: conversation.id,
                title: conversation.title,
                message_count,
            });
        }
        Ok(summaries)
    }

    pub async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<Vec<Message>> {
        self.store.messages(conversation_id).await
    }

    pub async fn append_user(
        &self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> anyhow::Result<Message> {
        let message = Message::user(*conversation_id, content);
        self.store.append_message(message.clone()).await?;
        Ok(message)
    }

    /// Assistant messages are persisted only after the full response is
    /// known, with its usage and sources.
    pub async fn append_assistant(
        &self,
        conversation_id: &ConversationId,
        content: &str,
        meta: MessageMeta,
    ) -> anyhow::Result<Message> {
        let message = Message::assistant(*conversation_id, content, meta);
        self.store.append_message(message.clone()).await?;
        Ok(message)
    }
}
