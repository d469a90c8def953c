use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, ProjectId, SourceRef};

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn into_string(&self) -> String {
        self.0.to_string()
    }

    pub fn parse(value: impl ToString) -> Result<Self, Error> {
        Ok(Self(
            Uuid::parse_str(&value.to_string()).map_err(Error::InvalidId)?,
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FileType {
    StudyGuide,
    Quiz,
    Summary,
    LessonPlan,
    Custom,
}

impl FileType {
    /// Stable kebab-case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::StudyGuide => "study-guide",
            FileType::Quiz => "quiz",
            FileType::Summary => "summary",
            FileType::LessonPlan => "lesson-plan",
            FileType::Custom => "custom",
        }
    }

    /// Label used on rendered covers and metadata lines.
    pub fn label(&self) -> &'static str {
        match self {
            FileType::StudyGuide => "Guia de Estudos",
            FileType::Quiz => "Questionário",
            FileType::Summary => "Resumo",
            FileType::LessonPlan => "Plano de Aula",
            FileType::Custom => "Personalizado",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[display("pdf")]
    Pdf,
    #[display("markdown")]
    Markdown,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Markdown => "md",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "application/pdf",
            FileFormat::Markdown => "text/markdown",
        }
    }
}

/// Derives the stable file name for a display name: lowercased, runs of
/// non-alphanumerics collapsed to a single `-`, at most 50 characters.
/// Idempotent: `slug(slug(x)) == slug(x)`.
pub fn slug(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut last_dash = true;
    for c in display_name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out.chars().take(50).collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Pending,
    Generating,
    Completed,
    Failed,
}

/// A generated artifact. `(project_id, file_name)` is unique; versions are
/// dense `1..=current_version`.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct GeneratedFile {
    pub id: FileId,
    pub project_id: ProjectId,
    pub owner_id: Uuid,
    pub file_name: String,
    pub display_name: String,
    pub file_type: FileType,
    pub format: FileFormat,
    pub current_version: u32,
    pub created_at: DateTime<Utc>,
}

impl GeneratedFile {
    pub fn new(
        project_id: ProjectId,
        owner_id: Uuid,
        display_name: impl Into<String>,
        file_type: FileType,
        format: FileFormat,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            id: FileId::generate(),
            project_id,
            owner_id,
            file_name: slug(&display_name),
            display_name,
            file_type,
            format,
            current_version: 1,
            created_at: Utc::now(),
        }
    }

    /// Object-storage key of one version's artifact bytes.
    pub fn artifact_key(&self, version: u32) -> String {
        format!("{}/v{}/file.{}", self.id, version, self.format.extension())
    }

    /// Key of the sibling metadata document for one version.
    pub fn metadata_key(&self, version: u32) -> String {
        format!("{}/v{}/metadata.json", self.id, version)
    }

    /// Filename offered on download. The version suffix is omitted for the
    /// current version.
    pub fn download_name(&self, version: Option<u32>) -> String {
        match version {
            Some(v) => format!("{}_v{}.{}", self.display_name, v, self.format.extension()),
            None => format!("{}.{}", self.display_name, self.format.extension()),
        }
    }
}

/// One immutable snapshot of a generated file.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct GeneratedFileVersion {
    pub file_id: FileId,
    pub version: u32,
    pub prompt: String,
    /// Version this one was edited from, when the job is an edit.
    pub base_version: Option<u32>,
    pub storage_key: String,
    pub size_bytes: u64,
    pub page_count: Option<u32>,
    pub status: VersionStatus,
    pub error: Option<String>,
    pub generation_ms: Option<u64>,
    pub sources: Vec<SourceRef>,
    pub created_at: DateTime<Utc>,
}

impl GeneratedFileVersion {
    pub fn pending(file_id: FileId, version: u32, prompt: impl Into<String>) -> Self {
        Self {
            file_id,
            version,
            prompt: prompt.into(),
            base_version: None,
            storage_key: String::new(),
            size_bytes: 0,
            page_count: None,
            status: VersionStatus::Pending,
            error: None,
            generation_ms: None,
            sources: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn slug_lowercases_and_dashes() {
        let actual = slug("Quiz Fotossintese 2024!");
        let expected = "quiz-fotossintese-2024";
        assert_eq!(actual, expected);
    }

    #[test]
    fn slug_collapses_runs_of_separators() {
        let actual = slug("a  --  b");
        let expected = "a-b";
        assert_eq!(actual, expected);
    }

    #[test]
    fn slug_is_idempotent() {
        let fixture = "Guia de Estudos: Revolução Industrial";

        let actual = slug(&slug(fixture));
        let expected = slug(fixture);
        assert_eq!(actual, expected);
    }

    #[test]
    fn slug_caps_at_fifty_chars() {
        let fixture = "x".repeat(80);

        let actual = slug(&fixture).len();
        let expected = 50;
        assert_eq!(actual, expected);
    }

    #[test]
    fn artifact_key_follows_layout() {
        let fixture = GeneratedFile::new(
            ProjectId::generate(),
            Uuid::new_v4(),
            "Quiz Fotossintese",
            FileType::Quiz,
            FileFormat::Pdf,
        );

        let actual = fixture.artifact_key(2);
        let expected = format!("{}/v2/file.pdf", fixture.id);
        assert_eq!(actual, expected);
    }

    #[test]
    fn download_name_includes_version_when_pinned() {
        let fixture = GeneratedFile::new(
            ProjectId::generate(),
            Uuid::new_v4(),
            "Resumo",
            FileType::Summary,
            FileFormat::Markdown,
        );

        let actual = (fixture.download_name(None), fixture.download_name(Some(3)));
        let expected = ("Resumo.md".to_string(), "Resumo_v3.md".to_string());
        assert_eq!(actual, expected);
    }
}
