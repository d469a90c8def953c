use async_trait::async_trait;

/// Trait for chunking extracted text into smaller pieces
pub trait Chunker: Send + Sync {
    type Input: Send;
    type Output: Send + Clone;

    fn chunk(&self, input: Self::Input) -> Vec<Self::Output>;
}

/// Trait for creating embeddings from chunks
#[async_trait]
pub trait Embedder: Send + Sync {
    type Input: Send;
    type Output: Send + Clone;

    async fn embed_batch(&self, inputs: Vec<Self::Input>) -> anyhow::Result<Vec<Self::Output>>;

    fn batch_size(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use crate::Chunker;

    #[test]
    fn chunker_is_object_safe() {
        let _: Option<Box<dyn Chunker<Input = String, Output = String>>> = None;
    }
}
