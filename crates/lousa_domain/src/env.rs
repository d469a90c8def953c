use std::str::FromStr;

use derive_setters::Setters;
use serde::{Deserialize, Serialize};

use crate::{RagConfig, RetryConfig};

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn var_or_else(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Chunking parameters for the text splitter.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, overlap: 200 }
    }
}

/// Conversation memory budget.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct MemoryConfig {
    pub max_tokens: u32,
    pub max_messages: usize,
    pub summary_threshold: usize,
    pub entity_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1500,
            max_messages: 20,
            summary_threshold: 10,
            entity_threshold: 2,
        }
    }
}

/// Model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct ModelConfig {
    pub embedding_model: String,
    pub chat_model: String,
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            max_tokens: 4000,
        }
    }
}

impl ModelConfig {
    /// Vector dimension of the configured embedding model.
    pub fn embedding_dimension(&self) -> u64 {
        match self.embedding_model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        }
    }
}

/// Vector store connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct VectorStoreConfig {
    pub url: String,
    pub api_key: Option<String>,
}

/// Object storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct StorageConfig {
    pub bucket: String,
}

/// Full runtime configuration, resolved from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct AppConfig {
    pub chunking: ChunkingConfig,
    pub rag: RagConfig,
    pub memory: MemoryConfig,
    pub model: ModelConfig,
    pub vector_store: VectorStoreConfig,
    pub storage: StorageConfig,
    pub retry: RetryConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_size: var_or("RAG_CHUNK_SIZE", 1000),
                overlap: var_or("RAG_CHUNK_OVERLAP", 200),
            },
            rag: RagConfig {
                max_chunks: var_or("RAG_MAX_CHUNKS", 5),
                similarity_threshold: var_or("RAG_SIMILARITY_THRESHOLD", 0.4),
            },
            memory: MemoryConfig {
                max_tokens: var_or("MEMORY_MAX_TOKENS", 1500),
                max_messages: var_or("MEMORY_MAX_MESSAGES", 20),
                summary_threshold: var_or("MEMORY_SUMMARY_THRESHOLD", 10),
                entity_threshold: var_or("MEMORY_ENTITY_THRESHOLD", 2),
            },
            model: ModelConfig {
                embedding_model: var_or_else("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
                chat_model: var_or_else("OPENAI_CHAT_MODEL", "gpt-4o-mini"),
                max_tokens: var_or("OPENAI_MAX_TOKENS", 4000),
            },
            vector_store: VectorStoreConfig {
                url: var_or_else("QDRANT_URL", "http://localhost:6334"),
                api_key: std::env::var("QDRANT_API_KEY").ok(),
            },
            storage: StorageConfig {
                bucket: var_or_else("STORAGE_BUCKET", "lousa-files"),
            },
            retry: RetryConfig::default(),
        }
    }
}
