use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use lousa_domain::ObjectStorage;

/// Bucket-less object storage over a map of keys to byte blobs.
#[derive(Default)]
pub struct InMemoryObjectStorage {
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(&self, key: &str, bytes: Bytes) -> anyhow::Result<()> {
        self.objects.write().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> anyhow::Result<Bytes> {
        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Object {key} not found"))
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.objects.write().unwrap().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.read().unwrap().contains_key(key))
    }

    async fn copy(&self, src: &str, dst: &str) -> anyhow::Result<()> {
        let bytes = self.get(src).await?;
        self.upload(dst, bytes).await
    }
}
