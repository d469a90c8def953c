/// OpenAI-backed implementation of the model provider contract
pub mod openai;

/// Bounded exponential-backoff retry around provider calls
pub mod retry;

pub use openai::OpenAiProvider;
pub use retry::retry_with_config;
