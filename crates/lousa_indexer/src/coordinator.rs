use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use lousa_domain::{
    AppConfig, ChunkMetadata, ChunkPayload, ChunkPoint, CollectionHandle, DocumentId,
    DocumentStore, Error, ObjectStorage, Project, ProjectId, ProjectStore, ProviderService,
    VectorIndex,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{ChunkEmbedder, DocumentLoader, TextSplitter};

const EMBED_BATCH_SIZE: usize = 100;

/// Serializes async work per key. Used for per-document ingest exclusion and
/// the per-project collection-creation lock.
pub struct KeyedLock<K> {
    slots: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash> KeyedLock<K> {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    pub async fn lock(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }
}

impl<K: Eq + Hash> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a successful ingest.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: DocumentId,
    pub chunks_processed: usize,
    pub collection_handle: CollectionHandle,
    pub processing_time: Duration,
}

/// Non-error outcomes of `ingest`.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested(IngestReport),
    /// The document was already processed; the call is a no-op success.
    AlreadyProcessed { document_id: DocumentId },
}

impl IngestOutcome {
    pub fn chunks_processed(&self) -> usize {
        match self {
            IngestOutcome::Ingested(report) => report.chunks_processed,
            IngestOutcome::AlreadyProcessed { .. } => 0,
        }
    }
}

/// One entry of a project-wide ingest. Failures stay per-document.
#[derive(Debug)]
pub struct ProjectIngestEntry {
    pub document_id: DocumentId,
    pub filename: String,
    pub outcome: anyhow::Result<IngestOutcome>,
}

/// Brings documents from "uploaded" to "processed": load, split, embed,
/// upsert, stamp. Keeps the indexed chunks in lock-step with the document's
/// current text.
pub struct IngestionCoordinator {
    projects: Arc<dyn ProjectStore>,
    documents: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    index: Arc<dyn VectorIndex>,
    loader: DocumentLoader,
    splitter: TextSplitter,
    embedder: ChunkEmbedder,
    embedding_dimension: u64,
    document_locks: KeyedLock<DocumentId>,
    project_locks: KeyedLock<ProjectId>,
}

impl IngestionCoordinator {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        documents: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn ProviderService>,
        config: &AppConfig,
    ) -> Self {
        Self {
            projects,
            documents,
            storage,
            index,
            loader: DocumentLoader::new(),
            splitter: TextSplitter::new(config.chunking.clone()),
            embedding_dimension: provider.embedding_dimension(),
            embedder: ChunkEmbedder::new(provider, EMBED_BATCH_SIZE),
            document_locks: KeyedLock::new(),
            project_locks: KeyedLock::new(),
        }
    }

    /// Ingests one document. Concurrent calls for the same document id
    /// serialize; an already processed document returns
    /// `IngestOutcome::AlreadyProcessed` without touching anything.
    pub async fn ingest(&self, document_id: &DocumentId) -> anyhow::Result<IngestOutcome> {
        let _guard = self.document_locks.lock(*document_id).await;
        self.ingest_locked(document_id).await
    }

    async fn ingest_locked(&self, document_id: &DocumentId) -> anyhow::Result<IngestOutcome> {
        let started = Instant::now();
        let mut document = self
            .documents
            .find(document_id)
            .await?
            .with_context(|| format!("Document {document_id} not found"))?;

        if document.is_processed() {
            debug!(document = %document_id, "Already processed, skipping");
            return Ok(IngestOutcome::AlreadyProcessed { document_id: *document_id });
        }

        let text = match document.extracted_text.clone() {
            Some(text) => text,
            None => {
                let bytes = self.storage.get(&document.storage_key).await?;
                let text = self
                    .loader
                    .load(&bytes, &document.mime_type, &document.filename)?;
                document.extracted_text = Some(text.clone());
                self.documents.upsert(document.clone()).await?;
                text
            }
        };

        let handle = self.ensure_project_collection(&document.project_id).await?;

        let chunks = self.splitter.split(&text);
        if chunks.is_empty() {
            anyhow::bail!(Error::EmptyContent);
        }

        // A previous attempt may have upserted a partial batch under other
        // point ids; clear them so a retry cannot leave duplicates behind.
        self.index.delete_by_document(&handle, document_id).await?;

        let vectors = self.embedder.embed_chunks(&chunks).await?;

        let created_at = Utc::now();
        let total_chunks = chunks.len();
        let points = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (chunk, vector))| {
                ChunkPoint::new(
                    vector,
                    ChunkPayload {
                        document_id: *document_id,
                        project_id: document.project_id,
                        content: chunk.clone(),
                        chunk_index,
                        metadata: ChunkMetadata {
                            filename: document.filename.clone(),
                            original_name: document.original_name.clone(),
                            mime_type: document.mime_type.clone(),
                            chunk_size: chunk.chars().count(),
                            total_chunks,
                            created_at,
                        },
                    },
                )
            })
            .collect();

        let chunks_processed = self.index.upsert(&handle, points).await?;

        document.processed_at = Some(Utc::now());
        self.documents.upsert(document).await?;

        let processing_time = started.elapsed();
        info!(
            document = %document_id,
            chunks = chunks_processed,
            elapsed_ms = processing_time.as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestOutcome::Ingested(IngestReport {
            document_id: *document_id,
            chunks_processed,
            collection_handle: handle,
            processing_time,
        }))
    }

    /// Drops the indexed chunks and extracted text, then ingests from the
    /// current raw bytes.
    pub async fn reingest(&self, document_id: &DocumentId) -> anyhow::Result<IngestOutcome> {
        {
            let _guard = self.document_locks.lock(*document_id).await;
            let mut document = self
                .documents
                .find(document_id)
                .await?
                .with_context(|| format!("Document {document_id} not found"))?;

            if let Some(handle) = self.collection_of(&document.project_id).await? {
                self.index.delete_by_document(&handle, document_id).await?;
            }

            document.processed_at = None;
            document.extracted_text = None;
            self.documents.upsert(document).await?;
        }

        self.ingest(document_id).await
    }

    /// Removes the document's chunks and raw bytes. The caller deletes the
    /// document record.
    pub async fn delete(&self, document_id: &DocumentId) -> anyhow::Result<()> {
        let _guard = self.document_locks.lock(*document_id).await;
        let document = self
            .documents
            .find(document_id)
            .await?
            .with_context(|| format!("Document {document_id} not found"))?;

        if let Some(handle) = self.collection_of(&document.project_id).await? {
            self.index.delete_by_document(&handle, document_id).await?;
        }
        self.storage.delete(&document.storage_key).await?;
        Ok(())
    }

    /// Ingests every unprocessed document of the project sequentially. A
    /// failing document never aborts the remaining ones.
    pub async fn ingest_project(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<ProjectIngestEntry>> {
        let documents = self.documents.list_by_project(project_id).await?;

        let mut entries = Vec::new();
        for document in documents.into_iter().filter(|d| !d.is_processed()) {
            let outcome = self.ingest(&document.id).await;
            if let Err(e) = &outcome {
                warn!(document = %document.id, error = %e, "Ingest failed");
            }
            entries.push(ProjectIngestEntry {
                document_id: document.id,
                filename: document.filename,
                outcome,
            });
        }
        Ok(entries)
    }

    /// Destroys the project's collection. Called as part of project deletion.
    pub async fn delete_project_collection(&self, project: &Project) -> anyhow::Result<()> {
        if let Some(handle) = &project.collection_handle {
            self.index.delete_collection(handle).await?;
        }
        Ok(())
    }

    async fn collection_of(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Option<CollectionHandle>> {
        let project = self
            .projects
            .find(project_id)
            .await?
            .with_context(|| format!("Project {project_id} not found"))?;
        Ok(project.collection_handle)
    }

    /// First ingest in a project creates and persists the collection handle
    /// under a per-project lock so two ingests cannot create two collections.
    async fn ensure_project_collection(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<CollectionHandle> {
        if let Some(handle) = self.collection_of(project_id).await? {
            return Ok(handle);
        }

        let _guard = self.project_locks.lock(*project_id).await;
        if let Some(handle) = self.collection_of(project_id).await? {
            return Ok(handle);
        }

        let handle = self
            .index
            .ensure_collection(project_id, self.embedding_dimension)
            .await?;
        self.projects.set_collection_handle(project_id, &handle).await?;
        Ok(handle)
    }
}
