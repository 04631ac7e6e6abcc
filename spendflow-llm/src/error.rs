//! Error taxonomy for the LLM layer.
//!
//! Retry classification lives here: the batch orchestrator backs off on
//! rate limits and server errors, and fails fast on everything else.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    /// Credentials or endpoint missing at provider construction time
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// Provider answered with a non-success HTTP status
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Request never produced a usable HTTP response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A response arrived but its payload was unusable
    #[error("unusable provider response: {0}")]
    BadResponse(String),
}

impl LlmError {
    /// Rate limits and server-side failures are worth retrying; auth and
    /// client errors are not. Transport failures (resets, timeouts) behave
    /// like server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Http { status, .. } => *status == 429 || *status >= 500,
            LlmError::Transport(_) => true,
            LlmError::MissingConfig(_) | LlmError::BadResponse(_) => false,
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        LlmError::Http {
            status,
            body: body.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(LlmError::http(429, "rate limited").is_retryable());
        assert!(LlmError::http(500, "oops").is_retryable());
        assert!(LlmError::http(503, "overloaded").is_retryable());
    }

    #[test]
    fn test_non_retryable() {
        assert!(!LlmError::http(400, "bad request").is_retryable());
        assert!(!LlmError::http(401, "bad key").is_retryable());
        assert!(!LlmError::MissingConfig("no key".to_string()).is_retryable());
        assert!(!LlmError::BadResponse("not json".to_string()).is_retryable());
    }
}
