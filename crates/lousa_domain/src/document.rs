use chrono::{DateTime, Utc};
use derive_more::derive::Display;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, ProjectId};

#[derive(Debug, Display, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
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

/// An uploaded source document.
///
/// Invariants: `extracted_text` is present iff the document has been loaded at
/// least once; `processed_at` is set iff the document's current chunks are in
/// the project collection; replacing the raw bytes clears `processed_at`.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
pub struct Document {
    pub id: DocumentId,
    pub project_id: ProjectId,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Object-storage key of the raw uploaded bytes.
    pub storage_key: String,
    pub extracted_text: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn new(
        project_id: ProjectId,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        let id = DocumentId::generate();
        let filename = filename.into();
        Self {
            id,
            project_id,
            original_name: filename.clone(),
            storage_key: format!("documents/{id}/{filename}"),
            filename,
            mime_type: mime_type.into(),
            size_bytes,
            extracted_text: None,
            processed_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    pub fn test() -> Self {
        Self::new(ProjectId::generate(), "hist.txt", "text/plain", 64)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn new_document_is_unprocessed() {
        let fixture = Document::test();

        let actual = (fixture.is_processed(), fixture.extracted_text.is_some());
        let expected = (false, false);
        assert_eq!(actual, expected);
    }

    #[test]
    fn storage_key_contains_document_id_and_filename() {
        let fixture = Document::test();

        let actual = fixture.storage_key;
        let expected = format!("documents/{}/hist.txt", fixture.id);
        assert_eq!(actual, expected);
    }
}
