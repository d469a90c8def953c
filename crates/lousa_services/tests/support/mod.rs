#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use lousa_domain::{
    AppConfig, ChatCompletion, ChatDelta, ChatRequest, Document, DocumentStore, ObjectStorage,
    Project, ProjectId, ProjectStore, ProviderService, ResultStream, Usage,
};
use lousa_indexer::IngestionCoordinator;
use lousa_infra::{
    AllowAllAccess, InMemoryConversationStore, InMemoryDocumentStore, InMemoryFileStore,
    InMemoryObjectStorage, InMemoryProjectStore, InMemoryVectorIndex, PlainTextPdfRenderer,
};
use lousa_services::{
    ConversationService, FileGenerator, MemoryManager, RagEngine, StreamingSession,
};
use uuid::Uuid;

/// Topic buckets recognized by the stub embedder. Texts sharing a bucket are
/// cosine-similar; texts in different buckets are orthogonal.
const TOPICS: [&[&str]; 4] = [
    &["fotoss", "planta", "luz", "clorofila", "energia"],
    &["brasil", "hist", "independ", "imp"],
    &["quantum", "cryptography", "qubit"],
    &["matem", "algebra", "equa"],
];

pub fn topic_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut vector = vec![0.0f32; TOPICS.len()];
    for (i, words) in TOPICS.iter().enumerate() {
        vector[i] = words.iter().filter(|w| lower.contains(*w)).count() as f32;
    }
    if vector.iter().all(|x| *x == 0.0) {
        vector[TOPICS.len() - 1] = 1.0;
    }
    vector
}

/// Deterministic model provider: keyword-bucket embeddings and a fixed chat
/// reply, recorded per request.
pub struct StubProvider {
    reply: Mutex<String>,
    pub requests: Mutex<Vec<ChatRequest>>,
    hang_stream: bool,
}

impl StubProvider {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply.to_string()),
            requests: Mutex::new(Vec::new()),
            hang_stream: false,
        })
    }

    /// Streams one delta and then never completes, for cancellation tests.
    pub fn hanging(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply.to_string()),
            requests: Mutex::new(Vec::new()),
            hang_stream: true,
        })
    }

    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .and_then(|r| r.messages.last().map(|m| m.content.clone()))
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProviderService for StubProvider {
    async fn chat(&self, request: ChatRequest) -> anyhow::Result<ChatCompletion> {
        self.requests.lock().unwrap().push(request);
        let reply = self.reply.lock().unwrap().clone();
        Ok(ChatCompletion::new(
            reply,
            Usage { prompt_tokens: 100, completion_tokens: 50, total_tokens: 150 },
        ))
    }

    async fn chat_stream(&self, request: ChatRequest) -> ResultStream<ChatDelta, anyhow::Error> {
        self.requests.lock().unwrap().push(request);
        let reply = self.reply.lock().unwrap().clone();

        let chars: Vec<char> = reply.chars().collect();
        let mut deltas: Vec<anyhow::Result<ChatDelta>> = chars
            .chunks(12)
            .map(|piece| Ok(ChatDelta::content(piece.iter().collect::<String>())))
            .collect();

        if self.hang_stream {
            let head = deltas.into_iter().take(1);
            let stream = futures::stream::iter(head).chain(futures::stream::pending());
            return Ok(Box::new(stream.boxed()));
        }

        deltas.push(Ok(ChatDelta {
            content: String::new(),
            usage: Some(Usage { prompt_tokens: 100, completion_tokens: 50, total_tokens: 150 }),
        }));
        Ok(Box::new(futures::stream::iter(deltas).boxed()))
    }

    async fn embed_batch(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| topic_vector(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(topic_vector(text))
    }

    fn embedding_dimension(&self) -> u64 {
        TOPICS.len() as u64
    }
}

/// Full in-memory stack wired the way the application composes it.
pub struct TestStack {
    pub projects: Arc<InMemoryProjectStore>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub storage: Arc<InMemoryObjectStorage>,
    pub conversations: Arc<InMemoryConversationStore>,
    pub files: Arc<InMemoryFileStore>,
    pub index: Arc<InMemoryVectorIndex>,
    pub provider: Arc<StubProvider>,
    pub config: AppConfig,
}

impl TestStack {
    pub fn new(provider: Arc<StubProvider>) -> Self {
        Self {
            projects: Arc::new(InMemoryProjectStore::new()),
            documents: Arc::new(InMemoryDocumentStore::new()),
            storage: Arc::new(InMemoryObjectStorage::new()),
            conversations: Arc::new(InMemoryConversationStore::new()),
            files: Arc::new(InMemoryFileStore::new()),
            index: Arc::new(InMemoryVectorIndex::new()),
            provider,
            config: AppConfig::default(),
        }
    }

    pub fn coordinator(&self) -> IngestionCoordinator {
        IngestionCoordinator::new(
            self.projects.clone(),
            self.documents.clone(),
            self.storage.clone(),
            self.index.clone(),
            self.provider.clone(),
            &self.config,
        )
    }

    pub fn memory(&self) -> Arc<MemoryManager> {
        Arc::new(MemoryManager::new(
            self.conversations.clone(),
            self.provider.clone(),
            self.config.memory.clone(),
        ))
    }

    pub fn engine(&self) -> Arc<RagEngine> {
        Arc::new(RagEngine::new(
            self.projects.clone(),
            self.provider.clone(),
            self.index.clone(),
            self.memory(),
            self.config.rag,
        ))
    }

    pub fn session(&self) -> StreamingSession {
        StreamingSession::new(
            self.engine(),
            self.memory(),
            Arc::new(ConversationService::new(self.conversations.clone())),
            self.provider.clone(),
            Arc::new(AllowAllAccess),
        )
    }

    pub fn generator(&self) -> Arc<FileGenerator> {
        Arc::new(
            FileGenerator::new(
                self.projects.clone(),
                self.files.clone(),
                self.storage.clone(),
                self.index.clone(),
                self.provider.clone(),
                Arc::new(PlainTextPdfRenderer),
            )
            .unwrap(),
        )
    }

    pub async fn project(&self) -> Project {
        let project = Project::new(Uuid::new_v4(), "Biologia 101").subject("Biologia");
        self.projects.upsert(project.clone()).await.unwrap();
        project
    }

    /// Uploads raw bytes and registers the document, unprocessed.
    pub async fn add_document(
        &self,
        project_id: ProjectId,
        filename: &str,
        text: &str,
    ) -> Document {
        let document = Document::new(
            project_id,
            filename,
            "text/plain",
            text.len() as u64,
        );
        self.storage
            .upload(&document.storage_key, Bytes::from(text.as_bytes().to_vec()))
            .await
            .unwrap();
        self.documents.upsert(document.clone()).await.unwrap();
        document
    }
}

/// Text whose paragraphs each land in their own chunk with the default
/// 1000/200 splitter config.
pub fn study_text(paragraphs: usize) -> String {
    (0..paragraphs)
        .map(|i| {
            format!(
                "Parágrafo {i} sobre fotossíntese e clorofila. {}",
                "As plantas convertem luz em energia química. ".repeat(14)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// A model reply following the mandated quiz shape.
pub fn quiz_markdown(questions: usize) -> String {
    let mut out = String::from("## Instruções\nResponda todas as questões abaixo.\n\n## Questões\n");
    for i in 1..=questions {
        out.push_str(&format!(
            "### Questão {i}\nO que as plantas produzem na fotossíntese?\n\
             A. Oxigênio\nB. Ferro\nC. Plástico\nD. Sal\n\n"
        ));
    }
    out.push_str("## Gabarito\n");
    for i in 1..=questions {
        out.push_str(&format!("{i}. A\n"));
    }
    out
}
