use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use uuid::Uuid;

use crate::{
    ChatCompletion, ChatDelta, ChatRequest, ChunkPoint, CollectionHandle, CollectionStats,
    Conversation, ConversationId, Document, DocumentId, FileId, GeneratedFile,
    GeneratedFileVersion, Message, PdfArtifact, PdfDocumentSpec, Project, ProjectId, ScoredChunk,
    SearchQuery,
};

pub type BoxStream<T, E> = Box<dyn Stream<Item = Result<T, E>> + Send + Unpin>;
pub type ResultStream<T, E> = Result<BoxStream<T, E>, E>;

/// Model provider: batched embeddings plus chat completion with a streaming
/// variant. Implementations own the retry policy.
#[async_trait]
pub trait ProviderService: Send + Sync + 'static {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatCompletion>;

    async fn chat_stream(&self, request: ChatRequest)
        -> ResultStream<ChatDelta, anyhow::Error>;

    /// Returns one vector per input, in input order.
    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embedding_dimension(&self) -> u64;
}

/// Gateway to the external vector store. One collection per project, cosine
/// distance.
#[async_trait]
pub trait VectorIndex: Send + Sync + 'static {
    /// Idempotent: returns the existing handle when the collection is already
    /// present.
    async fn ensure_collection(
        &self,
        project_id: &ProjectId,
        dimension: u64,
    ) -> anyhow::Result<CollectionHandle>;

    async fn upsert(&self, handle: &CollectionHandle, points: Vec<ChunkPoint>)
        -> anyhow::Result<usize>;

    /// Up to `limit` hits with score >= threshold, sorted by descending score
    /// (ties: chunk index, then id).
    async fn search(
        &self,
        handle: &CollectionHandle,
        query: SearchQuery,
    ) -> anyhow::Result<Vec<ScoredChunk>>;

    /// Idempotent filtered delete by payload document id.
    async fn delete_by_document(
        &self,
        handle: &CollectionHandle,
        document_id: &DocumentId,
    ) -> anyhow::Result<()>;

    async fn delete_collection(&self, handle: &CollectionHandle) -> anyhow::Result<()>;

    async fn stats(&self, handle: &CollectionHandle) -> anyhow::Result<CollectionStats>;
}

/// Relational store of projects.
#[async_trait]
pub trait ProjectStore: Send + Sync + 'static {
    async fn find(&self, id: &ProjectId) -> anyhow::Result<Option<Project>>;

    async fn upsert(&self, project: Project) -> anyhow::Result<()>;

    /// Persists the lazily created collection handle. The handle is set at
    /// most once per project.
    async fn set_collection_handle(
        &self,
        id: &ProjectId,
        handle: &CollectionHandle,
    ) -> anyhow::Result<()>;
}

/// Relational store of documents.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn find(&self, id: &DocumentId) -> anyhow::Result<Option<Document>>;

    async fn list_by_project(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>>;

    async fn upsert(&self, document: Document) -> anyhow::Result<()>;

    async fn delete(&self, id: &DocumentId) -> anyhow::Result<()>;
}

/// Relational store of conversations and their ordered message logs.
#[async_trait]
pub trait ConversationStore: Send + Sync + 'static {
    async fn find(&self, id: &ConversationId) -> anyhow::Result<Option<Conversation>>;

    async fn create(&self, conversation: Conversation) -> anyhow::Result<()>;

    async fn list_by_project(&self, project_id: &ProjectId)
        -> anyhow::Result<Vec<Conversation>>;

    /// Messages in insertion order.
    async fn messages(&self, id: &ConversationId) -> anyhow::Result<Vec<Message>>;

    async fn append_message(&self, message: Message) -> anyhow::Result<()>;
}

/// Relational store of generated files and their versions.
#[async_trait]
pub trait GeneratedFileStore: Send + Sync + 'static {
    async fn find(&self, id: &FileId) -> anyhow::Result<Option<GeneratedFile>>;

    async fn find_by_name(
        &self,
        project_id: &ProjectId,
        file_name: &str,
    ) -> anyhow::Result<Option<GeneratedFile>>;

    async fn upsert(&self, file: GeneratedFile) -> anyhow::Result<()>;

    /// Cascades to all versions.
    async fn delete(&self, id: &FileId) -> anyhow::Result<()>;

    async fn versions(&self, id: &FileId) -> anyhow::Result<Vec<GeneratedFileVersion>>;

    async fn find_version(
        &self,
        id: &FileId,
        version: u32,
    ) -> anyhow::Result<Option<GeneratedFileVersion>>;

    async fn upsert_version(&self, version: GeneratedFileVersion) -> anyhow::Result<()>;
}

/// Bulk object storage for raw uploads and generated artifacts.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn upload(&self, key: &str, bytes: Bytes) -> anyhow::Result<()>;

    async fn get(&self, key: &str) -> anyhow::Result<Bytes>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    async fn exists(&self, key: &str) -> anyhow::Result<bool>;

    async fn copy(&self, src: &str, dst: &str) -> anyhow::Result<()>;
}

/// External PDF layout engine.
#[async_trait]
pub trait PdfRenderer: Send + Sync + 'static {
    async fn render(&self, spec: PdfDocumentSpec) -> anyhow::Result<PdfArtifact>;
}

/// Ownership hook consulted by the streaming session before serving a
/// project.
#[async_trait]
pub trait ProjectAccess: Send + Sync + 'static {
    async fn can_access(&self, user_id: Uuid, project_id: &ProjectId) -> anyhow::Result<bool>;
}
