use std::sync::Arc;

use async_trait::async_trait;
use lousa_domain::ProviderService;
use tracing::debug;

use crate::Embedder;

/// Embeds chunk batches through the model provider, one provider call per
/// `batch_size` chunks. The provider owns the retry policy.
#[derive(Clone)]
pub struct ChunkEmbedder {
    provider: Arc<dyn ProviderService>,
    batch_size: usize,
}

impl ChunkEmbedder {
    pub fn new(provider: Arc<dyn ProviderService>, batch_size: usize) -> Self {
        Self { provider, batch_size }
    }

    /// Embeds every chunk, preserving order across batches.
    pub async fn embed_chunks(&self, chunks: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size.max(1)) {
            debug!(batch = batch.len(), "Embedding chunk batch");
            let embedded = self.provider.embed_batch(batch.to_vec()).await?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for ChunkEmbedder {
    type Input = String;
    type Output = Vec<f32>;

    async fn embed_batch(&self, inputs: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        self.embed_chunks(&inputs).await
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}
