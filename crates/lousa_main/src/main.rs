use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand, ValueEnum};
use lousa_domain::{
    AppConfig, Document, DocumentStore, FileFormat, FileType, MessageMeta, ObjectStorage,
    Project, ProjectStore, ProviderService, RetryConfig, VectorIndex, VersionStatus,
};
use lousa_indexer::{IngestionCoordinator, QdrantIndex};
use lousa_infra::{
    InMemoryConversationStore, InMemoryDocumentStore, InMemoryFileStore, InMemoryObjectStorage,
    InMemoryProjectStore, InMemoryVectorIndex, PlainTextPdfRenderer,
};
use lousa_provider::OpenAiProvider;
use lousa_services::{
    ConversationService, CreateFileParams, FileGenerator, MemoryManager, RagEngine,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lousa")]
#[command(about = "RAG core of the Lousa educational assistant")]
struct Cli {
    /// Use the Qdrant instance from QDRANT_URL instead of the in-memory index
    #[arg(long, global = true)]
    qdrant: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents and answer a question grounded in them
    Ask {
        /// Documents to ingest (pdf, docx, txt, md)
        #[arg(short, long = "doc")]
        docs: Vec<PathBuf>,
        /// The question to answer
        question: String,
    },
    /// Ingest documents and generate a study artifact
    Generate {
        #[arg(short, long = "doc")]
        docs: Vec<PathBuf>,
        /// Generation prompt
        prompt: String,
        /// Display name of the generated file
        #[arg(long, default_value = "Material Gerado")]
        name: String,
        #[arg(long, value_enum, default_value_t = FileTypeArg::StudyGuide)]
        file_type: FileTypeArg,
        #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
        format: FormatArg,
        /// Where to write the artifact
        #[arg(short, long, default_value = "lousa-output")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FileTypeArg {
    StudyGuide,
    Quiz,
    Summary,
    LessonPlan,
    Custom,
}

impl From<FileTypeArg> for FileType {
    fn from(arg: FileTypeArg) -> Self {
        match arg {
            FileTypeArg::StudyGuide => FileType::StudyGuide,
            FileTypeArg::Quiz => FileType::Quiz,
            FileTypeArg::Summary => FileType::Summary,
            FileTypeArg::LessonPlan => FileType::LessonPlan,
            FileTypeArg::Custom => FileType::Custom,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Pdf,
    Markdown,
}

impl From<FormatArg> for FileFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pdf => FileFormat::Pdf,
            FormatArg::Markdown => FileFormat::Markdown,
        }
    }
}

struct Stack {
    projects: Arc<InMemoryProjectStore>,
    documents: Arc<InMemoryDocumentStore>,
    storage: Arc<InMemoryObjectStorage>,
    index: Arc<dyn VectorIndex>,
    provider: Arc<dyn ProviderService>,
    coordinator: IngestionCoordinator,
    project: Project,
    config: AppConfig,
}

impl Stack {
    fn new(config: AppConfig, use_qdrant: bool) -> anyhow::Result<Self> {
        let provider: Arc<dyn ProviderService> = Arc::new(OpenAiProvider::new(
            config.model.clone(),
            RetryConfig::default(),
        ));
        let index: Arc<dyn VectorIndex> = if use_qdrant {
            Arc::new(QdrantIndex::try_new(
                &config.vector_store.url,
                config.vector_store.api_key.clone(),
            )?)
        } else {
            Arc::new(InMemoryVectorIndex::new())
        };

        let projects = Arc::new(InMemoryProjectStore::new());
        let documents = Arc::new(InMemoryDocumentStore::new());
        let storage = Arc::new(InMemoryObjectStorage::new());

        let coordinator = IngestionCoordinator::new(
            projects.clone(),
            documents.clone(),
            storage.clone(),
            index.clone(),
            provider.clone(),
            &config,
        );

        let project = Project::new(Uuid::new_v4(), "Sessão CLI").subject("Geral");

        Ok(Self {
            projects,
            documents,
            storage,
            index,
            provider,
            coordinator,
            project,
            config,
        })
    }

    async fn ingest(&self, docs: &[PathBuf]) -> anyhow::Result<()> {
        self.projects.upsert(self.project.clone()).await?;

        for path in docs {
            let bytes = std::fs::read(path)?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "documento".to_string());
            let document = Document::new(
                self.project.id,
                filename,
                mime_for(path),
                bytes.len() as u64,
            );
            self.storage
                .upload(&document.storage_key, Bytes::from(bytes))
                .await?;
            self.documents.upsert(document).await?;
        }

        for entry in self.coordinator.ingest_project(&self.project.id).await? {
            match entry.outcome {
                Ok(outcome) => println!(
                    "Indexed {} ({} chunks)",
                    entry.filename,
                    outcome.chunks_processed()
                ),
                Err(e) => println!("Failed {}: {e}", entry.filename),
            }
        }

        if let Some(project) = self.projects.find(&self.project.id).await? {
            if let Some(handle) = &project.collection_handle {
                let stats = self.index.stats(handle).await?;
                println!(
                    "Collection {handle}: {} points ({})",
                    stats.points_count, stats.status
                );
            }
        }
        Ok(())
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("md") | Some("markdown") => "text/markdown",
        _ => "text/plain",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Ask { docs, question } => {
            let stack = Stack::new(config, cli.qdrant)?;
            stack.ingest(&docs).await?;

            let conversations = Arc::new(InMemoryConversationStore::new());
            let memory = Arc::new(MemoryManager::new(
                conversations.clone(),
                stack.provider.clone(),
                stack.config.memory.clone(),
            ));
            let engine = RagEngine::new(
                stack.projects.clone(),
                stack.provider.clone(),
                stack.index.clone(),
                memory,
                stack.config.rag,
            );
            let service = ConversationService::new(conversations);
            let (conversation, _) = service.open(&stack.project.id, None, &question).await?;
            service.append_user(&conversation.id, &question).await?;

            let answer = engine
                .query_with_memory(&stack.project.id, &question, &conversation.id)
                .await?;
            service
                .append_assistant(
                    &conversation.id,
                    &answer.answer,
                    MessageMeta {
                        tokens_used: answer.tokens_used,
                        sources: answer.sources.clone(),
                    },
                )
                .await?;

            println!("\n{}", answer.answer);
            if !answer.sources.is_empty() {
                println!("\nFontes:");
                for source in &answer.sources {
                    println!(
                        "  {} (chunk {}, score {:.3})",
                        source.filename, source.chunk_index, source.score
                    );
                }
            }
            println!("\nTokens: {}", answer.tokens_used);
        }
        Commands::Generate { docs, prompt, name, file_type, format, output } => {
            let stack = Stack::new(config, cli.qdrant)?;
            stack.ingest(&docs).await?;

            let files = Arc::new(InMemoryFileStore::new());
            let generator = Arc::new(FileGenerator::new(
                stack.projects.clone(),
                files,
                stack.storage.clone(),
                stack.index.clone(),
                stack.provider.clone(),
                Arc::new(PlainTextPdfRenderer),
            )?);

            let mut progress = generator.subscribe();
            let file = generator
                .create_file(CreateFileParams {
                    project_id: stack.project.id,
                    owner_id: stack.project.owner_id,
                    prompt,
                    display_name: name,
                    file_type: file_type.into(),
                    format: format.into(),
                })
                .await?;
            println!("Generating {} ({})...", file.display_name, file.file_name);

            loop {
                let event = progress.recv().await?;
                if event.file_id != file.id {
                    continue;
                }
                match event.status {
                    VersionStatus::Completed => break,
                    VersionStatus::Failed => anyhow::bail!(
                        "generation failed: {}",
                        event.message.unwrap_or_default()
                    ),
                    _ => {}
                }
            }

            let download = generator.download(&file.id, None).await?;
            let target = if output.extension().is_some() {
                output
            } else {
                output.join(&download.filename)
            };
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &download.bytes)?;
            println!("Wrote {} ({} bytes)", target.display(), download.bytes.len());
        }
    }
    Ok(())
}
