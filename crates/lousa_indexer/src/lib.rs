/// Core traits for the ingestion pipeline
pub mod traits;

/// Format-specific text extraction
pub mod loader;
pub mod loaders;

pub mod coordinator;
pub mod embedder;
pub mod qdrant;

/// Recursive character splitter
pub mod splitter;

pub use coordinator::*;
pub use embedder::*;
pub use loader::*;
pub use qdrant::QdrantIndex;
pub use splitter::*;
pub use traits::*;
