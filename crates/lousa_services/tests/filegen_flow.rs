mod support;

use lousa_domain::{FileFormat, FileType, GeneratedFileStore, ObjectStorage, VersionStatus};
use lousa_services::{CreateFileParams, NewVersionParams};
use pretty_assertions::assert_eq;
use support::{quiz_markdown, study_text, StubProvider, TestStack};
use uuid::Uuid;

fn quiz_params(stack_project: lousa_domain::ProjectId) -> CreateFileParams {
    CreateFileParams {
        project_id: stack_project,
        owner_id: Uuid::new_v4(),
        prompt: "Crie um quiz de 10 perguntas sobre fotossíntese".to_string(),
        display_name: "Quiz Fotossintese".to_string(),
        file_type: FileType::Quiz,
        format: FileFormat::Pdf,
    }
}

async fn wait_for_terminal(
    progress: &mut tokio::sync::broadcast::Receiver<lousa_domain::GenerationProgress>,
    file_id: lousa_domain::FileId,
    version: u32,
) -> lousa_domain::GenerationProgress {
    loop {
        let event = progress.recv().await.unwrap();
        if event.file_id == file_id
            && event.version == version
            && matches!(event.status, VersionStatus::Completed | VersionStatus::Failed)
        {
            return event;
        }
    }
}

#[tokio::test]
async fn scenario_e_quiz_generation_without_context() {
    let stack = TestStack::new(StubProvider::new(&quiz_markdown(10)));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator.create_file(quiz_params(project.id)).await.unwrap();
    assert_eq!(file.file_name, "quiz-fotossintese");
    assert_eq!(file.current_version, 1);

    let terminal = wait_for_terminal(&mut progress, file.id, 1).await;
    assert_eq!(terminal.status, VersionStatus::Completed);
    assert_eq!(terminal.progress, 100);

    let version = stack
        .files
        .find_version(&file.id, 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version.status, VersionStatus::Completed);
    assert_eq!(version.sources.len(), 0);
    assert!(version.page_count.unwrap_or_default() >= 2);
    assert!(version.generation_ms.is_some());
    assert_eq!(version.storage_key, format!("{}/v1/file.pdf", file.id));

    // the stored artifact parses as a quiz with an answer key
    let bytes = stack.storage.get(&version.storage_key).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let questions = text.matches("### Questão").count();
    assert!(questions >= 8, "only {questions} questions rendered");
    assert!(text.contains("## Gabarito"));

    // sibling metadata document
    let metadata = stack
        .storage
        .get(&file.metadata_key(1))
        .await
        .unwrap();
    let metadata: serde_json::Value = serde_json::from_slice(&metadata).unwrap();
    assert_eq!(metadata["sources"].as_array().unwrap().len(), 0);
    assert_eq!(metadata["file"]["version"], 1);
}

#[tokio::test]
async fn slug_collision_creates_a_new_version() {
    let stack = TestStack::new(StubProvider::new("# Resumo\n\nConteúdo."));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let mut params = quiz_params(project.id);
    params.file_type = FileType::Summary;
    params.format = FileFormat::Markdown;
    params.display_name = "Resumo Celulas".to_string();

    let first = generator.create_file(params.clone()).await.unwrap();
    wait_for_terminal(&mut progress, first.id, 1).await;

    let second = generator.create_file(params).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.current_version, 2);
    wait_for_terminal(&mut progress, first.id, 2).await;

    let versions = stack.files.versions(&first.id).await.unwrap();
    let numbers: Vec<u32> = versions.iter().map(|v| v.version).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn markdown_artifacts_carry_front_matter() {
    let stack = TestStack::new(StubProvider::new("# Guia\n\nCorpo do guia."));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "guia sobre fotossíntese".to_string(),
            display_name: "Guia Fotossintese".to_string(),
            file_type: FileType::StudyGuide,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();
    wait_for_terminal(&mut progress, file.id, 1).await;

    let bytes = stack
        .storage
        .get(&file.artifact_key(1))
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("---\ntitle: Guia Fotossintese\ntype: study-guide\n"));
    assert!(text.contains("version: 1"));
    assert!(text.ends_with("# Guia\n\nCorpo do guia."));
}

#[tokio::test]
async fn edits_feed_the_base_content_to_the_edit_template() {
    let stack = TestStack::new(StubProvider::new("# Resumo\n\nPrimeira versão."));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "resumo inicial".to_string(),
            display_name: "Resumo Editavel".to_string(),
            file_type: FileType::Summary,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();
    wait_for_terminal(&mut progress, file.id, 1).await;

    stack.provider.set_reply("# Resumo\n\nSegunda versão, revisada.");
    let updated = generator
        .new_version(NewVersionParams {
            file_id: file.id,
            edit_prompt: "acrescente uma conclusão".to_string(),
            base_version: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.current_version, 2);
    wait_for_terminal(&mut progress, file.id, 2).await;

    let prompt = stack.provider.last_prompt();
    assert!(prompt.contains("Primeira versão."));
    assert!(prompt.contains("acrescente uma conclusão"));

    let row = stack.files.find_version(&file.id, 2).await.unwrap().unwrap();
    assert_eq!(row.base_version, Some(1));
}

#[tokio::test]
async fn generation_uses_project_context_when_indexed() {
    let stack = TestStack::new(StubProvider::new("# Guia\n\nBaseado nos documentos."));
    let project = stack.project().await;
    stack
        .add_document(project.id, "fotossintese.txt", &study_text(3))
        .await;
    stack
        .coordinator()
        .ingest_project(&project.id)
        .await
        .unwrap();

    let generator = stack.generator();
    let mut progress = generator.subscribe();
    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "crie um guia sobre fotossíntese nas plantas".to_string(),
            display_name: "Guia Com Contexto".to_string(),
            file_type: FileType::StudyGuide,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();
    wait_for_terminal(&mut progress, file.id, 1).await;

    let version = stack.files.find_version(&file.id, 1).await.unwrap().unwrap();
    assert!(!version.sources.is_empty());

    let prompt = stack.provider.last_prompt();
    assert!(prompt.contains("fotossintese.txt"));
}

#[tokio::test]
async fn empty_model_output_fails_the_version() {
    let stack = TestStack::new(StubProvider::new("   "));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "qualquer coisa".to_string(),
            display_name: "Vazio".to_string(),
            file_type: FileType::Custom,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();

    let terminal = wait_for_terminal(&mut progress, file.id, 1).await;
    assert_eq!(terminal.status, VersionStatus::Failed);

    let version = stack.files.find_version(&file.id, 1).await.unwrap().unwrap();
    assert_eq!(version.status, VersionStatus::Failed);
    assert!(version.error.is_some());
}

#[tokio::test]
async fn download_names_pinned_versions() {
    let stack = TestStack::new(StubProvider::new("# Doc\n\nCorpo."));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "doc".to_string(),
            display_name: "Apostila".to_string(),
            file_type: FileType::Custom,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();
    wait_for_terminal(&mut progress, file.id, 1).await;

    let current = generator.download(&file.id, None).await.unwrap();
    assert_eq!(current.filename, "Apostila.md");
    assert_eq!(current.content_type, "text/markdown");

    let pinned = generator.download(&file.id, Some(1)).await.unwrap();
    assert_eq!(pinned.filename, "Apostila_v1.md");
}

#[tokio::test]
async fn delete_file_cascades_versions_and_bytes() {
    let stack = TestStack::new(StubProvider::new("# Doc\n\nCorpo."));
    let project = stack.project().await;
    let generator = stack.generator();
    let mut progress = generator.subscribe();

    let file = generator
        .create_file(CreateFileParams {
            project_id: project.id,
            owner_id: Uuid::new_v4(),
            prompt: "doc".to_string(),
            display_name: "Descartavel".to_string(),
            file_type: FileType::Custom,
            format: FileFormat::Markdown,
        })
        .await
        .unwrap();
    wait_for_terminal(&mut progress, file.id, 1).await;
    let key = file.artifact_key(1);
    assert!(stack.storage.exists(&key).await.unwrap());

    generator.delete_file(&file.id).await.unwrap();

    assert!(stack.files.find(&file.id).await.unwrap().is_none());
    assert_eq!(stack.files.versions(&file.id).await.unwrap().len(), 0);
    assert!(!stack.storage.exists(&key).await.unwrap());
}
