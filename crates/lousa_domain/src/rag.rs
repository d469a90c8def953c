use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::{DocumentId, ScoredChunk};

/// Number of characters kept in a source preview.
pub const SOURCE_PREVIEW_CHARS: usize = 200;

/// Back-pointer from an answer to one retrieved chunk, in retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub document_id: DocumentId,
    pub filename: String,
    pub content_preview: String,
    pub score: f32,
    pub chunk_index: usize,
}

impl From<&ScoredChunk> for SourceRef {
    fn from(chunk: &ScoredChunk) -> Self {
        Self {
            document_id: chunk.payload.document_id,
            filename: chunk.payload.metadata.filename.clone(),
            content_preview: preview(&chunk.payload.content),
            score: chunk.score,
            chunk_index: chunk.payload.chunk_index,
        }
    }
}

/// First 200 characters of a chunk, with an ellipsis when truncated.
pub fn preview(content: &str) -> String {
    if content.chars().count() <= SOURCE_PREVIEW_CHARS {
        content.to_string()
    } else {
        let head: String = content.chars().take(SOURCE_PREVIEW_CHARS).collect();
        format!("{head}…")
    }
}

/// A grounded answer with attribution.
#[derive(Debug, Clone, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub tokens_used: u32,
}

/// Rewriting mode for educational queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EducationalMode {
    Question,
    Summary,
    Quiz,
    Explanation,
}

/// Retrieval tuning shared by the query engine and the file generator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct RagConfig {
    pub max_chunks: u64,
    pub similarity_threshold: f32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { max_chunks: 5, similarity_threshold: 0.4 }
    }
}
