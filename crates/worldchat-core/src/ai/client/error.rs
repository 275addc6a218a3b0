use crate::ai::retry::{is_retryable_status, IsRetryable};

/// Failure of a single provider call
#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned HTTP {status}: {message}")]
    Provider { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl IsRetryable for AiError {
    fn is_retryable(&self) -> bool {
        match self {
            AiError::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AiError::Provider { status, .. } => is_retryable_status(*status),
            AiError::MalformedResponse(_) => false,
        }
    }
}
