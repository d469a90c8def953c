use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lousa_domain::{
    CollectionHandle, Conversation, ConversationId, ConversationStore, Document, DocumentId,
    DocumentStore, FileId, GeneratedFile, GeneratedFileStore, GeneratedFileVersion, Message,
    Project, ProjectId, ProjectStore,
};

/// In-memory project table.
#[derive(Default)]
pub struct InMemoryProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn find(&self, id: &ProjectId) -> anyhow::Result<Option<Project>> {
        Ok(self.projects.read().unwrap().get(id).cloned())
    }

    async fn upsert(&self, project: Project) -> anyhow::Result<()> {
        self.projects.write().unwrap().insert(project.id, project);
        Ok(())
    }

    async fn set_collection_handle(
        &self,
        id: &ProjectId,
        handle: &CollectionHandle,
    ) -> anyhow::Result<()> {
        let mut projects = self.projects.write().unwrap();
        let project = projects
            .get_mut(id)
            .ok_or_else(|| anyhow::anyhow!("Project {id} not found"))?;
        if let Some(existing) = &project.collection_handle {
            // set at most once per project
            anyhow::ensure!(
                existing == handle,
                "collection handle already set to {existing}"
            );
            return Ok(());
        }
        project.collection_handle = Some(handle.clone());
        Ok(())
    }
}

/// In-memory document table.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, id: &DocumentId) -> anyhow::Result<Option<Document>> {
        Ok(self.documents.read().unwrap().get(id).cloned())
    }

    async fn list_by_project(&self, project_id: &ProjectId) -> anyhow::Result<Vec<Document>> {
        let mut documents: Vec<Document> = self
            .documents
            .read()
            .unwrap()
            .values()
            .filter(|d| d.project_id == *project_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.id.into_string());
        Ok(documents)
    }

    async fn upsert(&self, document: Document) -> anyhow::Result<()> {
        self.documents.write().unwrap().insert(document.id, document);
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> anyhow::Result<()> {
        self.documents.write().unwrap().remove(id);
        Ok(())
    }
}

/// In-memory conversation table with per-conversation message logs.
#[derive(Default)]
pub struct InMemoryConversationStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    messages: RwLock<HashMap<ConversationId, Vec<Message>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn find(&self, id: &ConversationId) -> anyhow::Result<Option<Conversation>> {
        Ok(self.conversations.read().unwrap().get(id).cloned())
    }

    async fn create(&self, conversation: Conversation) -> anyhow::Result<()> {
        self.conversations
            .write()
            .unwrap()
            .insert(conversation.id, conversation);
        Ok(())
    }

    async fn list_by_project(
        &self,
        project_id: &ProjectId,
    ) -> anyhow::Result<Vec<Conversation>> {
        let mut conversations: Vec<Conversation> = self
            .conversations
            .read()
            .unwrap()
            .values()
            .filter(|c| c.project_id == *project_id)
            .cloned()
            .collect();
        conversations.sort_by_key(|c| c.created_at);
        Ok(conversations)
    }

    async fn messages(&self, id: &ConversationId) -> anyhow::Result<Vec<Message>> {
        Ok(self
            .messages
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn append_message(&self, message: Message) -> anyhow::Result<()> {
        self.messages
            .write()
            .unwrap()
            .entry(message.conversation_id)
            .or_default()
            .push(message);
        Ok(())
    }
}

/// In-memory generated-file table with version rows.
#[derive(Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<FileId, GeneratedFile>>,
    versions: RwLock<HashMap<FileId, Vec<GeneratedFileVersion>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GeneratedFileStore for InMemoryFileStore {
    async fn find(&self, id: &FileId) -> anyhow::Result<Option<GeneratedFile>> {
        Ok(self.files.read().unwrap().get(id).cloned())
    }

    async fn find_by_name(
        &self,
        project_id: &ProjectId,
        file_name: &str,
    ) -> anyhow::Result<Option<GeneratedFile>> {
        Ok(self
            .files
            .read()
            .unwrap()
            .values()
            .find(|f| f.project_id == *project_id && f.file_name == file_name)
            .cloned())
    }

    async fn upsert(&self, file: GeneratedFile) -> anyhow::Result<()> {
        self.files.write().unwrap().insert(file.id, file);
        Ok(())
    }

    async fn delete(&self, id: &FileId) -> anyhow::Result<()> {
        self.files.write().unwrap().remove(id);
        self.versions.write().unwrap().remove(id);
        Ok(())
    }

    async fn versions(&self, id: &FileId) -> anyhow::Result<Vec<GeneratedFileVersion>> {
        Ok(self
            .versions
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default())
    }

    async fn find_version(
        &self,
        id: &FileId,
        version: u32,
    ) -> anyhow::Result<Option<GeneratedFileVersion>> {
        Ok(self
            .versions
            .read()
            .unwrap()
            .get(id)
            .and_then(|versions| versions.iter().find(|v| v.version == version).cloned()))
    }

    async fn upsert_version(&self, version: GeneratedFileVersion) -> anyhow::Result<()> {
        let mut versions = self.versions.write().unwrap();
        let rows = versions.entry(version.file_id).or_default();
        match rows.iter_mut().find(|v| v.version == version.version) {
            Some(row) => *row = version,
            None => {
                rows.push(version);
                rows.sort_by_key(|v| v.version);
            }
        }
        Ok(())
    }
}
