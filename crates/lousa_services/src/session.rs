use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lousa_domain::{
    estimate_tokens, ChatRequest, ClientEvent, ConversationId, Error, MessageMeta, ProjectAccess,
    ProjectId, ProviderService, RagAnswer, ScoredChunk, SessionEvent, SessionStage,
    SourcePreview, Usage,
};
use lousa_domain::preview;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{ConversationService, MemoryManager, RagEngine};

/// How long a full event buffer may stall before the stream is aborted.
const SLOW_CONSUMER_GRACE: Duration = Duration::from_secs(5);

/// Drives the query flow over a bidirectional event channel: progress
/// stages, incremental output, persistence after completion.
pub struct StreamingSession {
    engine: Arc<RagEngine>,
    memory: Arc<MemoryManager>,
    conversations: Arc<ConversationService>,
    provider: Arc<dyn ProviderService>,
    access: Arc<dyn ProjectAccess>,
    slow_consumer_grace: Duration,
}

impl StreamingSession {
    pub fn new(
        engine: Arc<RagEngine>,
        memory: Arc<MemoryManager>,
        conversations: Arc<ConversationService>,
        provider: Arc<dyn ProviderService>,
        access: Arc<dyn ProjectAccess>,
    ) -> Self {
        Self {
            engine,
            memory,
            conversations,
            provider,
            access,
            slow_consumer_grace: SLOW_CONSUMER_GRACE,
        }
    }

    pub fn slow_consumer_grace(mut self, grace: Duration) -> Self {
        self.slow_consumer_grace = grace;
        self
    }

    /// Dispatches one client event. Failures surface as `error` events;
    /// cancellation is silent.
    pub async fn handle(
        &self,
        user_id: Uuid,
        event: ClientEvent,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) {
        let result = match event {
            ClientEvent::Start { project_id, message, conversation_id } => {
                self.start(user_id, &project_id, &message, conversation_id, tx, cancel)
                    .await
            }
            ClientEvent::ListConversations { project_id } => {
                self.list_conversations(&project_id, tx, cancel).await
            }
            ClientEvent::LoadConversation { conversation_id } => {
                self.load_conversation(&conversation_id, tx, cancel).await
            }
        };

        if let Err(e) = result {
            match e.downcast_ref::<Error>() {
                Some(Error::Cancelled) => debug!("Session cancelled by client"),
                Some(Error::SlowConsumer) => {
                    warn!("Client cannot keep up, aborting stream");
                    // the buffer that tripped the abort is still full; wait a
                    // bounded time for the consumer to free a slot so the
                    // abort reason reaches it
                    let event = SessionEvent::Error { message: "slow_consumer".to_string() };
                    if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
                        let _ = tokio::time::timeout(
                            self.slow_consumer_grace * 10,
                            tx.send(event),
                        )
                        .await;
                    }
                }
                _ => {
                    warn!(error = %e, "Streaming session failed");
                    let _ = tx.try_send(SessionEvent::Error { message: e.to_string() });
                }
            }
        }
    }

    async fn start(
        &self,
        user_id: Uuid,
        project_id: &ProjectId,
        message: &str,
        conversation_id: Option<ConversationId>,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        self.emit(tx, cancel, SessionEvent::status(SessionStage::Validating))
            .await?;
        if !self.access.can_access(user_id, project_id).await? {
            anyhow::bail!("user {user_id} cannot access project {project_id}");
        }

        self.emit(tx, cancel, SessionEvent::status(SessionStage::Conversation))
            .await?;
        let (conversation, created) = self
            .conversations
            .open(project_id, conversation_id, message)
            .await?;
        if created {
            self.emit(
                tx,
                cancel,
                SessionEvent::ConversationCreated {
                    id: conversation.id,
                    title: conversation.title.clone().unwrap_or_default(),
                },
            )
            .await?;
        }

        let user_message = self.conversations.append_user(&conversation.id, message).await?;
        self.emit(tx, cancel, SessionEvent::UserMessage { message: user_message })
            .await?;

        self.emit(tx, cancel, SessionEvent::status(SessionStage::Memory))
            .await?;
        let memory = self.memory.build(&conversation.id).await?;

        self.emit(tx, cancel, SessionEvent::status(SessionStage::Embedding))
            .await?;
        let chunks = match self.engine.collection_handle(project_id).await? {
            Some(handle) => {
                let vector = self.engine.embed_query(message).await?;
                self.emit(tx, cancel, SessionEvent::status(SessionStage::Search))
                    .await?;
                self.engine.retrieve(&handle, vector).await?
            }
            None => {
                self.emit(tx, cancel, SessionEvent::status(SessionStage::Search))
                    .await?;
                Vec::new()
            }
        };

        self.emit(tx, cancel, SessionEvent::status(SessionStage::Generating))
            .await?;
        self.emit(
            tx,
            cancel,
            SessionEvent::StreamStart { sources_preview: previews(&chunks) },
        )
        .await?;

        let answer = self.stream_answer(&memory, &chunks, message, tx, cancel).await?;

        self.emit(tx, cancel, SessionEvent::status(SessionStage::Saving))
            .await?;
        let meta = MessageMeta {
            tokens_used: answer.tokens_used,
            sources: answer.sources.clone(),
        };
        let assistant = self
            .conversations
            .append_assistant(&conversation.id, &answer.answer, meta)
            .await?;

        self.emit(
            tx,
            cancel,
            SessionEvent::StreamComplete {
                message_id: assistant.id,
                content: answer.answer,
                tokens_used: answer.tokens_used,
                sources: answer.sources,
            },
        )
        .await?;
        self.emit(tx, cancel, SessionEvent::status(SessionStage::Completed))
            .await?;
        Ok(())
    }

    /// Streams the model response, emitting a chunk event per delta. Nothing
    /// is persisted here; the caller saves only after the stream completes.
    async fn stream_answer(
        &self,
        memory: &crate::MemoryContext,
        chunks: &[ScoredChunk],
        question: &str,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<RagAnswer> {
        let messages = RagEngine::compose(memory, chunks, question);
        let mut stream = self.provider.chat_stream(ChatRequest::new(messages)).await?;

        let mut full = String::new();
        let mut usage: Option<Usage> = None;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => anyhow::bail!(Error::Cancelled),
                item = stream.next() => match item {
                    Some(Ok(delta)) => {
                        if let Some(delta_usage) = delta.usage {
                            usage = Some(delta_usage);
                        }
                        if !delta.content.is_empty() {
                            full.push_str(&delta.content);
                            self.emit(tx, cancel, SessionEvent::StreamChunk {
                                content: delta.content,
                                full_content: full.clone(),
                            })
                            .await?;
                        }
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }

        if full.trim().is_empty() {
            anyhow::bail!(Error::ModelReturnedEmpty);
        }

        let tokens_used = usage
            .map(|u| u.total_tokens)
            .unwrap_or_else(|| estimate_tokens(&full));

        Ok(RagAnswer {
            answer: full,
            sources: RagEngine::sources(chunks),
            tokens_used,
        })
    }

    async fn list_conversations(
        &self,
        project_id: &ProjectId,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let conversations = self.conversations.list(project_id).await?;
        self.emit(tx, cancel, SessionEvent::ConversationList { conversations })
            .await
    }

    async fn load_conversation(
        &self,
        conversation_id: &ConversationId,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let messages = self.conversations.load(conversation_id).await?;
        self.emit(
            tx,
            cancel,
            SessionEvent::ConversationLoaded { id: *conversation_id, messages },
        )
        .await
    }

    /// Sends one event. A full buffer is given a short grace period; a
    /// consumer that stays behind aborts the stream.
    async fn emit(
        &self,
        tx: &mpsc::Sender<SessionEvent>,
        cancel: &CancellationToken,
        event: SessionEvent,
    ) -> anyhow::Result<()> {
        if cancel.is_cancelled() {
            anyhow::bail!(Error::Cancelled);
        }
        match tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => anyhow::bail!(Error::Cancelled),
            Err(mpsc::error::TrySendError::Full(event)) => {
                tokio::select! {
                    _ = cancel.cancelled() => anyhow::bail!(Error::Cancelled),
                    sent = tokio::time::timeout(self.slow_consumer_grace, tx.send(event)) => {
                        match sent {
                            Ok(Ok(())) => Ok(()),
                            Ok(Err(_)) => anyhow::bail!(Error::Cancelled),
                            Err(_) => anyhow::bail!(Error::SlowConsumer),
                        }
                    }
                }
            }
        }
    }
}

fn previews(chunks: &[ScoredChunk]) -> Vec<SourcePreview> {
    chunks
        .iter()
        .map(|chunk| SourcePreview {
            filename: chunk.payload.metadata.filename.clone(),
            content: preview(&chunk.payload.content),
            score: chunk.score,
        })
        .collect()
}
