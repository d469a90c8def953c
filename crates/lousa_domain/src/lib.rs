/// Chat message and token accounting types
pub mod chat;

/// Chunk, point and search types shared with the vector store
pub mod chunk;

pub mod conversation;
pub mod document;
pub mod env;
pub mod error;

/// Wire protocol for the streaming session and generation jobs
pub mod event;

pub mod generated_file;
pub mod pdf;
pub mod project;
pub mod rag;
pub mod retry_config;

/// Traits for the external collaborators the core consumes
pub mod services;

pub use chat::*;
pub use chunk::*;
pub use conversation::*;
pub use document::*;
pub use env::*;
pub use error::*;
pub use event::*;
pub use generated_file::*;
pub use pdf::*;
pub use project::*;
pub use rag::*;
pub use retry_config::*;
pub use services::*;
