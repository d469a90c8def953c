use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use lousa_domain::{
    sort_scored_chunks, ChunkPoint, CollectionHandle, CollectionStats, DocumentId, Error,
    ProjectId, ScoredChunk, SearchQuery, VectorIndex,
};

struct CollectionState {
    dimension: u64,
    points: Vec<ChunkPoint>,
}

/// Brute-force cosine-similarity vector index. Behaviorally equivalent to the
/// Qdrant gateway for the operations the core uses.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, CollectionState>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn ensure_collection(
        &self,
        project_id: &ProjectId,
        dimension: u64,
    ) -> anyhow::Result<CollectionHandle> {
        let handle = CollectionHandle::for_project(project_id);
        self.collections
            .write()
            .unwrap()
            .entry(handle.as_str().to_string())
            .or_insert_with(|| CollectionState { dimension, points: Vec::new() });
        Ok(handle)
    }

    async fn upsert(
        &self,
        handle: &CollectionHandle,
        points: Vec<ChunkPoint>,
    ) -> anyhow::Result<usize> {
        let mut collections = self.collections.write().unwrap();
        let collection = collections
            .get_mut(handle.as_str())
            .ok_or_else(|| Error::VectorStoreUnavailable(format!("no collection {handle}")))?;

        for point in &points {
            if point.vector.len() as u64 != collection.dimension {
                anyhow::bail!(Error::VectorStoreCorrupt(format!(
                    "dimension mismatch: expected {}, got {}",
                    collection.dimension,
                    point.vector.len()
                )));
            }
        }

        let count = points.len();
        collection.points.extend(points);
        Ok(count)
    }

    async fn search(
        &self,
        handle: &CollectionHandle,
        query: SearchQuery,
    ) -> anyhow::Result<Vec<ScoredChunk>> {
        let collections = self.collections.read().unwrap();
        let collection = collections
            .get(handle.as_str())
            .ok_or_else(|| Error::VectorStoreUnavailable(format!("no collection {handle}")))?;

        let threshold = query.score_threshold.unwrap_or(f32::MIN);
        let mut hits: Vec<ScoredChunk> = collection
            .points
            .iter()
            .map(|point| ScoredChunk {
                id: point.id,
                score: cosine_sim(&point.vector, &query.vector),
                payload: point.payload.clone(),
            })
            .filter(|hit| hit.score >= threshold)
            .collect();

        sort_scored_chunks(&mut hits);
        hits.truncate(query.limit as usize);
        Ok(hits)
    }

    async fn delete_by_document(
        &self,
        handle: &CollectionHandle,
        document_id: &DocumentId,
    ) -> anyhow::Result<()> {
        let mut collections = self.collections.write().unwrap();
        if let Some(collection) = collections.get_mut(handle.as_str()) {
            collection
                .points
                .retain(|point| point.payload.document_id != *document_id);
        }
        Ok(())
    }

    async fn delete_collection(&self, handle: &CollectionHandle) -> anyhow::Result<()> {
        self.collections.write().unwrap().remove(handle.as_str());
        Ok(())
    }

    async fn stats(&self, handle: &CollectionHandle) -> anyhow::Result<CollectionStats> {
        let collections = self.collections.read().unwrap();
        let collection = collections
            .get(handle.as_str())
            .ok_or_else(|| Error::VectorStoreUnavailable(format!("no collection {handle}")))?;
        Ok(CollectionStats {
            points_count: collection.points.len() as u64,
            indexed_count: collection.points.len() as u64,
            status: "green".to_string(),
        })
    }
}
