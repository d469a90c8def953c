//! In-memory implementations of the external collaborators: the relational
//! store, object storage, the vector index and the PDF layout engine. Used by
//! the test suites and the CLI; production deployments swap in real backends
//! behind the same traits.

pub mod access;
pub mod object_storage;
pub mod pdf;
pub mod stores;
pub mod vector;

pub use access::AllowAllAccess;
pub use object_storage::InMemoryObjectStorage;
pub use pdf::PlainTextPdfRenderer;
pub use stores::{
    InMemoryConversationStore, InMemoryDocumentStore, InMemoryFileStore, InMemoryProjectStore,
};
pub use vector::InMemoryVectorIndex;
