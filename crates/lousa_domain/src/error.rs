use crate::ProjectId;

/// Core error kinds. Every variant carries a human-readable message and maps
/// to a stable code for callers that speak the wire protocol.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Document contains no extractable text")]
    EmptyContent,

    #[error("Failed to load document: {0}")]
    Loader(String),

    #[error("Embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector store unavailable: {0}")]
    VectorStoreUnavailable(String),

    #[error("Vector store corrupt: {0}")]
    VectorStoreCorrupt(String),

    #[error("Project {0} has no indexed documents")]
    NotIndexed(ProjectId),

    #[error("Model returned an empty response")]
    ModelReturnedEmpty,

    #[error("Client cannot keep up with the stream")]
    SlowConsumer,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid identifier: {0}")]
    InvalidId(uuid::Error),

    /// Transient failure eligible for retry. The retry policy only backs off
    /// on this variant.
    #[error(transparent)]
    Retryable(anyhow::Error),
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::EmptyContent => "EMPTY_CONTENT",
            Error::Loader(_) => "LOADER_FAILURE",
            Error::EmbeddingUnavailable(_) => "EMBEDDING_UNAVAILABLE",
            Error::VectorStoreUnavailable(_) => "VECTOR_STORE_UNAVAILABLE",
            Error::VectorStoreCorrupt(_) => "VECTOR_STORE_CORRUPT",
            Error::NotIndexed(_) => "NOT_INDEXED",
            Error::ModelReturnedEmpty => "MODEL_RETURNED_EMPTY",
            Error::SlowConsumer => "SLOW_CONSUMER",
            Error::Cancelled => "CANCELLED",
            Error::InvalidId(_) => "INVALID_ID",
            Error::Retryable(_) => "RETRYABLE",
        }
    }

    pub fn retryable(cause: impl Into<anyhow::Error>) -> Self {
        Error::Retryable(cause.into())
    }
}

/// True when the given error should trigger another retry attempt.
pub fn should_retry(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<Error>()
        .is_some_and(|error| matches!(error, Error::Retryable(_)))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn codes_are_stable() {
        let fixture = Error::EmptyContent;

        let actual = fixture.code();
        let expected = "EMPTY_CONTENT";
        assert_eq!(actual, expected);
    }

    #[test]
    fn only_retryable_errors_retry() {
        let retryable = anyhow::Error::from(Error::retryable(anyhow::anyhow!("timeout")));
        let terminal = anyhow::Error::from(Error::EmptyContent);

        let actual = (should_retry(&retryable), should_retry(&terminal));
        let expected = (true, false);
        assert_eq!(actual, expected);
    }
}
