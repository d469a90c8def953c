use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use bytes::Bytes;
use chrono::Utc;
use lousa_domain::{
    ChatMessage, ChatRequest, Error, FileFormat, FileId, FileType, GeneratedFile,
    GeneratedFileStore, GeneratedFileVersion, GenerationProgress, ObjectStorage, PdfDocumentSpec,
    PdfRenderer, Project, ProjectId, ProjectStore, ProviderService, ScoredChunk, SearchQuery,
    SourceRef, VectorIndex, VersionStatus,
};
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::markdown::{parse_blocks, parse_quiz, quiz_blocks};
use crate::templates::{PromptTemplates, TemplateParams};

/// Retrieval depth for generation context.
const CONTEXT_CHUNKS: u64 = 5;

/// Stop set applied to prompt-derived search terms.
const SEARCH_STOP_WORDS: &[&str] = &[
    "create", "generate", "make", "about", "with", "guide", "quiz", "crie", "sobre",
    "perguntas", "alternativas", "tema",
];

/// First five meaningful tokens of the prompt, used as the retrieval query.
pub fn search_terms(prompt: &str) -> String {
    prompt
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() > 3)
        .filter(|token| !SEARCH_STOP_WORDS.contains(token))
        .take(5)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone)]
pub struct CreateFileParams {
    pub project_id: ProjectId,
    pub owner_id: Uuid,
    pub prompt: String,
    pub display_name: String,
    pub file_type: FileType,
    pub format: FileFormat,
}

#[derive(Debug, Clone)]
pub struct NewVersionParams {
    pub file_id: FileId,
    pub edit_prompt: String,
    pub base_version: Option<u32>,
}

/// A downloadable artifact.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Bytes,
}

/// Generates versioned artifacts on top of the RAG pipeline. Generation runs
/// as detached jobs with progress on a broadcast channel.
pub struct FileGenerator {
    projects: Arc<dyn ProjectStore>,
    files: Arc<dyn GeneratedFileStore>,
    storage: Arc<dyn ObjectStorage>,
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn ProviderService>,
    renderer: Arc<dyn PdfRenderer>,
    templates: PromptTemplates,
    progress: broadcast::Sender<GenerationProgress>,
    jobs: Mutex<HashMap<(FileId, u32), AbortHandle>>,
}

impl FileGenerator {
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        files: Arc<dyn GeneratedFileStore>,
        storage: Arc<dyn ObjectStorage>,
        index: Arc<dyn VectorIndex>,
        provider: Arc<dyn ProviderService>,
        renderer: Arc<dyn PdfRenderer>,
    ) -> anyhow::Result<Self> {
        let (progress, _) = broadcast::channel(64);
        Ok(Self {
            projects,
            files,
            storage,
            index,
            provider,
            renderer,
            templates: PromptTemplates::new()?,
            progress,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Progress events for all running jobs; callers filter by owner.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationProgress> {
        self.progress.subscribe()
    }

    /// Creates a file and launches generation of version 1. When a file with
    /// the same slug already exists in the project, this becomes a new
    /// version of it instead.
    pub async fn create_file(
        self: &Arc<Self>,
        params: CreateFileParams,
    ) -> anyhow::Result<GeneratedFile> {
        let file_name = lousa_domain::slug(&params.display_name);

        if let Some(existing) = self
            .files
            .find_by_name(&params.project_id, &file_name)
            .await?
        {
            debug!(file = %existing.id, "Slug collision, creating a new version instead");
            return self
                .new_version(NewVersionParams {
                    file_id: existing.id,
                    edit_prompt: params.prompt,
                    base_version: None,
                })
                .await;
        }

        let file = GeneratedFile::new(
            params.project_id,
            params.owner_id,
            params.display_name,
            params.file_type,
            params.format,
        );
        self.files.upsert(file.clone()).await?;
        self.files
            .upsert_version(GeneratedFileVersion::pending(file.id, 1, &params.prompt))
            .await?;

        self.spawn_job(file.clone(), 1, params.prompt, None);
        Ok(file)
    }

    /// Creates the next version of an existing file and launches generation.
    /// The base version's content is fetched from object storage; when it is
    /// unavailable (or not markdown) the job degrades to a fresh generation.
    pub async fn new_version(
        self: &Arc<Self>,
        params: NewVersionParams,
    ) -> anyhow::Result<GeneratedFile> {
        let mut file = self
            .files
            .find(&params.file_id)
            .await?
            .with_context(|| format!("File {} not found", params.file_id))?;

        let next_version = file.current_version + 1;
        let base = params.base_version.unwrap_or(file.current_version);
        let base_content = self.load_base_content(&file, base).await;

        let version = GeneratedFileVersion::pending(file.id, next_version, &params.edit_prompt)
            .base_version(base);
        self.files.upsert_version(version).await?;

        file.current_version = next_version;
        self.files.upsert(file.clone()).await?;

        self.spawn_job(file.clone(), next_version, params.edit_prompt, base_content);
        Ok(file)
    }

    async fn load_base_content(&self, file: &GeneratedFile, base: u32) -> Option<String> {
        if file.format != FileFormat::Markdown {
            return None;
        }
        match self.storage.get(&file.artifact_key(base)).await {
            Ok(bytes) => String::from_utf8(bytes.to_vec()).ok(),
            Err(_) => {
                debug!(file = %file.id, base, "Base version unavailable, generating fresh");
                None
            }
        }
    }

    /// Cancels a version's job and marks the row failed.
    pub async fn cancel_version(&self, file_id: &FileId, version: u32) -> anyhow::Result<()> {
        if let Some(handle) = self.jobs.lock().unwrap().remove(&(*file_id, version)) {
            handle.abort();
        }
        if let Some(mut row) = self.files.find_version(file_id, version).await? {
            row.status = VersionStatus::Failed;
            row.error = Some("cancelled".to_string());
            self.files.upsert_version(row).await?;
        }
        Ok(())
    }

    /// Deletes the file, every version row and all stored artifacts.
    pub async fn delete_file(&self, file_id: &FileId) -> anyhow::Result<()> {
        let file = self
            .files
            .find(file_id)
            .await?
            .with_context(|| format!("File {file_id} not found"))?;

        {
            let mut jobs = self.jobs.lock().unwrap();
            jobs.retain(|(id, _), handle| {
                if id == file_id {
                    handle.abort();
                    false
                } else {
                    true
                }
            });
        }

        for version in self.files.versions(file_id).await? {
            self.storage.delete(&file.artifact_key(version.version)).await?;
            self.storage.delete(&file.metadata_key(version.version)).await?;
        }
        self.files.delete(file_id).await
    }

    /// Bytes of one version (default: current), with the download filename
    /// and content type.
    pub async fn download(
        &self,
        file_id: &FileId,
        version: Option<u32>,
    ) -> anyhow::Result<FileDownload> {
        let file = self
            .files
            .find(file_id)
            .await?
            .with_context(|| format!("File {file_id} not found"))?;
        let effective = version.unwrap_or(file.current_version);

        let bytes = self.storage.get(&file.artifact_key(effective)).await?;
        Ok(FileDownload {
            filename: file.download_name(version),
            content_type: file.format.content_type(),
            bytes,
        })
    }

    fn spawn_job(
        self: &Arc<Self>,
        file: GeneratedFile,
        version: u32,
        prompt: String,
        base_content: Option<String>,
    ) {
        let this = Arc::clone(self);
        let file_id = file.id;
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            if let Err(e) = this
                .run_job(&file, version, &prompt, base_content, started)
                .await
            {
                warn!(file = %file.id, version, error = %e, "Generation job failed");
                if let Err(mark) = this.mark_failed(&file.id, version, &e.to_string()).await {
                    warn!(file = %file.id, version, error = %mark, "Failed to record job failure");
                }
                this.send_progress(&file, version, VersionStatus::Failed, 0, Some(e.to_string()));
            }
            this.jobs.lock().unwrap().remove(&(file.id, version));
        });
        self.jobs
            .lock()
            .unwrap()
            .insert((file_id, version), handle.abort_handle());
    }

    async fn run_job(
        &self,
        file: &GeneratedFile,
        version: u32,
        prompt: &str,
        base_content: Option<String>,
        started: Instant,
    ) -> anyhow::Result<()> {
        self.send_progress(file, version, VersionStatus::Generating, 0, None);
        if let Some(mut row) = self.files.find_version(&file.id, version).await? {
            row.status = VersionStatus::Generating;
            self.files.upsert_version(row).await?;
        }

        let project = self
            .projects
            .find(&file.project_id)
            .await?
            .with_context(|| format!("Project {} not found", file.project_id))?;

        let chunks = self.gather_context(&project, prompt).await?;
        let sources: Vec<SourceRef> = chunks.iter().map(SourceRef::from).collect();

        let params = TemplateParams {
            prompt: prompt.to_string(),
            context: context_text(&chunks),
            project_name: project.name.clone(),
            subject: project.subject.clone().unwrap_or_else(|| project.name.clone()),
            base_content: base_content.clone().unwrap_or_default(),
        };
        let full_prompt = match base_content {
            Some(_) => self.templates.render_edit(&params)?,
            None => self.templates.render(file.file_type, &params)?,
        };

        let completion = self
            .provider
            .chat(ChatRequest::new(vec![ChatMessage::user(full_prompt)]))
            .await?;
        if completion.is_empty() {
            anyhow::bail!(Error::ModelReturnedEmpty);
        }

        let (bytes, page_count) = self
            .materialize(file, version, &completion.content, &project.name)
            .await?;
        let size_bytes = bytes.len() as u64;

        let artifact_key = file.artifact_key(version);
        self.storage.upload(&artifact_key, bytes).await?;

        let metadata = serde_json::json!({
            "prompt": prompt,
            "sources": sources,
            "file": {
                "id": file.id,
                "display_name": file.display_name,
                "type": file.file_type.as_str(),
                "format": file.format.to_string(),
                "version": version,
                "size_bytes": size_bytes,
                "page_count": page_count,
            },
            "generated_at": Utc::now().to_rfc3339(),
        });
        self.storage
            .upload(
                &file.metadata_key(version),
                Bytes::from(serde_json::to_vec_pretty(&metadata)?),
            )
            .await?;

        let mut row = self
            .files
            .find_version(&file.id, version)
            .await?
            .with_context(|| format!("Version {version} of {} not found", file.id))?;
        row.storage_key = artifact_key;
        row.size_bytes = size_bytes;
        row.page_count = page_count;
        row.status = VersionStatus::Completed;
        row.error = None;
        row.generation_ms = Some(started.elapsed().as_millis() as u64);
        row.sources = sources;
        self.files.upsert_version(row).await?;

        info!(
            file = %file.id,
            version,
            size_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Artifact generated"
        );
        self.send_progress(file, version, VersionStatus::Completed, 100, None);
        Ok(())
    }

    /// Retrieval context for generation: prompt-derived search terms against
    /// the project collection, when both exist.
    async fn gather_context(
        &self,
        project: &Project,
        prompt: &str,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let terms = search_terms(prompt);
        let handle = match (&project.collection_handle, terms.is_empty()) {
            (Some(handle), false) => handle,
            _ => return Ok(Vec::new()),
        };

        let vector = self.provider.embed_query(&terms).await?;
        self.index
            .search(handle, SearchQuery::new(vector, CONTEXT_CHUNKS))
            .await
    }

    async fn materialize(
        &self,
        file: &GeneratedFile,
        version: u32,
        content: &str,
        project_name: &str,
    ) -> anyhow::Result<(Bytes, Option<u32>)> {
        match file.format {
            FileFormat::Markdown => {
                let front_matter = format!(
                    "---\ntitle: {}\ntype: {}\nproject: {}\ngenerated: {}\nversion: {}\n---\n\n",
                    file.display_name,
                    file.file_type.as_str(),
                    file.project_id,
                    Utc::now().to_rfc3339(),
                    version,
                );
                Ok((Bytes::from(format!("{front_matter}{content}")), None))
            }
            FileFormat::Pdf => {
                let blocks = match file.file_type {
                    FileType::Quiz => match parse_quiz(content) {
                        Some(quiz) => quiz_blocks(&quiz),
                        None => parse_blocks(content),
                    },
                    _ => parse_blocks(content),
                };
                let spec = PdfDocumentSpec::new(
                    file.display_name.clone(),
                    format!(
                        "{} • {} • Gerado em {}",
                        project_name,
                        file.file_type.label(),
                        Utc::now().format("%d/%m/%Y"),
                    ),
                )
                .blocks(blocks);
                let artifact = self.renderer.render(spec).await?;
                Ok((Bytes::from(artifact.bytes), Some(artifact.page_count)))
            }
        }
    }

    async fn mark_failed(
        &self,
        file_id: &FileId,
        version: u32,
        message: &str,
    ) -> anyhow::Result<()> {
        if let Some(mut row) = self.files.find_version(file_id, version).await? {
            row.status = VersionStatus::Failed;
            row.error = Some(message.to_string());
            self.files.upsert_version(row).await?;
        }
        Ok(())
    }

    fn send_progress(
        &self,
        file: &GeneratedFile,
        version: u32,
        status: VersionStatus,
        progress: u8,
        message: Option<String>,
    ) {
        // no receivers is fine; progress is best effort
        let _ = self.progress.send(GenerationProgress {
            owner_id: file.owner_id,
            file_id: file.id,
            version,
            status,
            progress,
            message,
        });
    }
}

fn context_text(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            format!(
                "--- {} ---\n{}",
                chunk.payload.metadata.filename, chunk.payload.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn search_terms_drop_stop_words_and_short_tokens() {
        let actual = search_terms("Crie um quiz de 10 perguntas sobre fotossíntese no Brasil");
        let expected = "fotossíntese brasil";
        assert_eq!(actual, expected);
    }

    #[test]
    fn search_terms_take_at_most_five() {
        let actual = search_terms("independencia republica escravidao imigracao industria cafe");
        let expected = "independencia republica escravidao imigracao industria";
        assert_eq!(actual, expected);
    }

    #[test]
    fn context_text_labels_each_chunk() {
        use chrono::Utc;
        use lousa_domain::{ChunkMetadata, ChunkPayload, DocumentId};

        let chunk = ScoredChunk {
            id: uuid::Uuid::new_v4(),
            score: 0.8,
            payload: ChunkPayload {
                document_id: DocumentId::generate(),
                project_id: ProjectId::generate(),
                content: "conteúdo".to_string(),
                chunk_index: 0,
                metadata: ChunkMetadata {
                    filename: "hist.txt".to_string(),
                    original_name: "hist.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                    chunk_size: 8,
                    total_chunks: 1,
                    created_at: Utc::now(),
                },
            },
        };

        let actual = context_text(&[chunk]);
        let expected = "--- hist.txt ---\nconteúdo";
        assert_eq!(actual, expected);
    }
}
