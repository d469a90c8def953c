use std::sync::Arc;

use lousa_domain::{
    ChatMessage, ChatRequest, CollectionHandle, ConversationId, EducationalMode, Error,
    ProjectId, ProjectStore, ProviderService, RagAnswer, RagConfig, ScoredChunk, SearchQuery,
    SourceRef, VectorIndex,
};
use tracing::debug;

use crate::{MemoryContext, MemoryManager};

/// Fixed reply when retrieval finds nothing relevant. Not an error.
pub const NO_RESULTS_MESSAGE: &str = "Desculpe, não encontrei informações relevantes nos \
documentos do projeto para responder à sua pergunta.";

const SYSTEM_PREAMBLE: &str = "Você é um assistente educacional que responde com base nos \
documentos fornecidos pelo professor. Responda de forma clara e didática, em português, \
citando o conteúdo dos documentos quando fizer sentido. Se a resposta não estiver nos \
documentos, diga isso explicitamente.";

/// The consolidated query engine: embed, retrieve, assemble, generate,
/// attribute.
pub struct RagEngine {
    projects: Arc<dyn ProjectStore>,
    provider: Arc<dyn ProviderService>,
    index: Arc<dyn VectorIndex>,
    memory: Arc<MemoryManager>,
    config: RagConfig,
}

impl RagEngine {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        provider: Arc<dyn ProviderService>,
        index: Arc<dyn VectorIndex>,
        memory: Arc<MemoryManager>,
        config: RagConfig,
    ) -> Self {
        Self { projects, provider, index, memory, config }
    }

    /// The project's collection handle, if it was ever indexed.
    pub async fn collection_handle(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Option<CollectionHandle>> {
        let project = self
            .projects
            .find(project_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Project {project_id} not found"))?;
        Ok(project.collection_handle)
    }

    pub async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.provider.embed_query(text).await
    }

    /// Top-k retrieval with the configured threshold.
    pub async fn retrieve(
        &self,
        handle: &CollectionHandle,
        vector: Vec<f32>,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        self.index
            .search(
                handle,
                SearchQuery::new(vector, self.config.max_chunks)
                    .score_threshold(self.config.similarity_threshold),
            )
            .await
    }

    /// System message carrying the assistant preamble and the retrieved
    /// context in rank order.
    pub fn context_message(chunks: &[ScoredChunk]) -> ChatMessage {
        let mut content = String::from(SYSTEM_PREAMBLE);
        content.push_str("\n\nContext Documents:\n");
        for (i, chunk) in chunks.iter().enumerate() {
            content.push_str(&format!("--- Document {} ---\n", i + 1));
            content.push_str(&chunk.payload.content);
            content.push('\n');
        }
        ChatMessage::system(content)
    }

    /// Full message list for a memory-aware query. Without retrieval hits the
    /// context preamble is omitted and the model answers from memory alone.
    pub fn compose(
        memory: &MemoryContext,
        chunks: &[ScoredChunk],
        question: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = memory.messages.clone();
        if !chunks.is_empty() {
            messages.push(Self::context_message(chunks));
        }
        messages.push(ChatMessage::user(question));
        messages
    }

    pub fn sources(chunks: &[ScoredChunk]) -> Vec<SourceRef> {
        chunks.iter().map(SourceRef::from).collect()
    }

    /// Stateless query. Fails with `NotIndexed` when the project has no
    /// collection.
    pub async fn query(&self, project_id: &ProjectId, text: &str) -> anyhow::Result<RagAnswer> {
        let handle = self
            .collection_handle(project_id)
            .await?
            .ok_or(Error::NotIndexed(*project_id))?;

        let vector = self.embed_query(text).await?;
        let chunks = self.retrieve(&handle, vector).await?;
        debug!(project = %project_id, hits = chunks.len(), "Retrieval complete");

        if chunks.is_empty() {
            return Ok(RagAnswer {
                answer: NO_RESULTS_MESSAGE.to_string(),
                sources: Vec::new(),
                tokens_used: 0,
            });
        }

        let messages = vec![Self::context_message(&chunks), ChatMessage::user(text)];
        let completion = self.provider.chat(ChatRequest::new(messages)).await?;

        Ok(RagAnswer {
            answer: completion.content,
            sources: Self::sources(&chunks),
            tokens_used: completion.usage.total_tokens,
        })
    }

    /// Memory-aware query inside a conversation. A project without an index
    /// still gets a memory-only answer.
    pub async fn query_with_memory(
        &self,
        project_id: &ProjectId,
        text: &str,
        conversation_id: &ConversationId,
    ) -> anyhow::Result<RagAnswer> {
        let memory = self.memory.build(conversation_id).await?;

        let chunks = match self.collection_handle(project_id).await? {
            Some(handle) => {
                let vector = self.embed_query(text).await?;
                self.retrieve(&handle, vector).await?
            }
            None => Vec::new(),
        };

        let messages = Self::compose(&memory, &chunks, text);
        let completion = self.provider.chat(ChatRequest::new(messages)).await?;

        Ok(RagAnswer {
            answer: completion.content,
            sources: Self::sources(&chunks),
            tokens_used: completion.usage.total_tokens,
        })
    }

    /// Rewrites the question with the fixed prefix for the requested mode,
    /// then dispatches.
    pub async fn educational_query(
        &self,
        project_id: &ProjectId,
        text: &str,
        mode: EducationalMode,
        conversation_id: Option<&ConversationId>,
    ) -> anyhow::Result<RagAnswer> {
        let rewritten = rewrite_for_mode(text, mode);
        match conversation_id {
            Some(conversation_id) => {
                self.query_with_memory(project_id, &rewritten, conversation_id)
                    .await
            }
            None => self.query(project_id, &rewritten).await,
        }
    }
}

fn rewrite_for_mode(text: &str, mode: EducationalMode) -> String {
    match mode {
        EducationalMode::Question => text.to_string(),
        EducationalMode::Summary => {
            format!("Por favor, faça um resumo detalhado sobre: {text}")
        }
        EducationalMode::Quiz => {
            format!("Crie questões de múltipla escolha com 4 alternativas sobre: {text}")
        }
        EducationalMode::Explanation => format!(
            "Explique detalhadamente o conceito e forneça exemplos práticos sobre: {text}"
        ),
    }
}
