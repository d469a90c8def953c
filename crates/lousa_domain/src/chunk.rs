use chrono::{DateTime, Utc};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DocumentId, ProjectId};

/// Chunk-level metadata carried in every vector-store payload.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct ChunkMetadata {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub chunk_size: usize,
    pub total_chunks: usize,
    pub created_at: DateTime<Utc>,
}

/// Payload stored alongside each vector. Duplicates `document_id` and
/// `project_id` so retrieval results carry back-pointers without a join.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct ChunkPayload {
    pub document_id: DocumentId,
    pub project_id: ProjectId,
    pub content: String,
    pub chunk_index: usize,
    pub metadata: ChunkMetadata,
}

/// One (id, vector, payload) record bound for the vector store. Ids are fresh
/// UUIDs per ingest batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl ChunkPoint {
    pub fn new(vector: Vec<f32>, payload: ChunkPayload) -> Self {
        Self { id: Uuid::new_v4(), vector, payload }
    }
}

/// A retrieval hit: payload plus similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub id: Uuid,
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Search parameters for the vector store gateway.
#[derive(Debug, Clone, Setters)]
#[setters(strip_option, into)]
pub struct SearchQuery {
    pub vector: Vec<f32>,
    pub limit: u64,
    pub score_threshold: Option<f32>,
}

impl SearchQuery {
    pub fn new(vector: Vec<f32>, limit: u64) -> Self {
        Self { vector, limit, score_threshold: None }
    }
}

/// Point counts and health of one collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    pub points_count: u64,
    pub indexed_count: u64,
    pub status: String,
}

/// Orders retrieval hits deterministically: descending score, then ascending
/// chunk index, then ascending id.
pub fn sort_scored_chunks(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.payload.chunk_index.cmp(&b.payload.chunk_index))
            .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scored(score: f32, chunk_index: usize) -> ScoredChunk {
        let document_id = DocumentId::generate();
        let project_id = ProjectId::generate();
        ScoredChunk {
            id: Uuid::new_v4(),
            score,
            payload: ChunkPayload {
                document_id,
                project_id,
                content: "x".to_string(),
                chunk_index,
                metadata: ChunkMetadata {
                    filename: "f.txt".to_string(),
                    original_name: "f.txt".to_string(),
                    mime_type: "text/plain".to_string(),
                    chunk_size: 1,
                    total_chunks: 1,
                    created_at: Utc::now(),
                },
            },
        }
    }

    #[test]
    fn sorts_by_descending_score() {
        let mut fixture = vec![scored(0.5, 0), scored(0.9, 1), scored(0.7, 2)];

        sort_scored_chunks(&mut fixture);

        let actual: Vec<usize> = fixture.iter().map(|c| c.payload.chunk_index).collect();
        let expected = vec![1, 2, 0];
        assert_eq!(actual, expected);
    }

    #[test]
    fn ties_break_on_lower_chunk_index() {
        let mut fixture = vec![scored(0.5, 3), scored(0.5, 1), scored(0.5, 2)];

        sort_scored_chunks(&mut fixture);

        let actual: Vec<usize> = fixture.iter().map(|c| c.payload.chunk_index).collect();
        let expected = vec![1, 2, 3];
        assert_eq!(actual, expected);
    }
}
