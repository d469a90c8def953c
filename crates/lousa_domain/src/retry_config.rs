use derive_setters::Setters;
use serde::{Deserialize, Serialize};

/// Tuning for bounded exponential backoff around external calls.
#[derive(Debug, Clone, Serialize, Deserialize, Setters, PartialEq)]
#[setters(into)]
pub struct RetryConfig {
    /// Delay before the first retry, in milliseconds
    pub min_delay_ms: u64,

    /// Backoff multiplication factor for each retry attempt
    pub backoff_factor: u64,

    /// Maximum number of attempts, including the first
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { min_delay_ms: 1000, backoff_factor: 2, max_attempts: 3 }
    }
}

impl RetryConfig {
    /// Streaming chat uses a tighter budget than the other external calls.
    pub fn streaming() -> Self {
        Self::default().max_attempts(2usize)
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> usize {
        self.max_attempts.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_matches_embedding_policy() {
        let fixture = RetryConfig::default();

        let actual = (fixture.min_delay_ms, fixture.backoff_factor, fixture.max_attempts);
        let expected = (1000, 2, 3);
        assert_eq!(actual, expected);
    }

    #[test]
    fn streaming_uses_two_attempts() {
        let actual = RetryConfig::streaming().max_attempts;
        let expected = 2;
        assert_eq!(actual, expected);
    }
}
