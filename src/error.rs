use std::time::Duration;
use thiserror::Error;

// What a caller of `BatchCoordinator::submit` can get back instead of an answer.
// Clone because a single LLM failure is fanned out to every request in the batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("batch coordinator stopped before the request completed")]
    Cancelled,

    #[error("question must not be empty")]
    EmptyQuestion,
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request to language model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("language model returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("could not decode language model response: {0}")]
    Decode(String),

    #[error("no healthy backends available")]
    NoBackend,
}

impl LlmError {
    /// Whether another attempt has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Transport(e) => !e.is_decode() && !e.is_builder(),
            LlmError::Status(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            LlmError::Decode(_) => false,
            LlmError::NoBackend => true,
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("retriever request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("retriever returned status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("at least one backend required")]
    NoBackends,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

impl From<LlmError> for BatchError {
    fn from(e: LlmError) -> Self {
        BatchError::Upstream(e.to_string())
    }
}

impl From<RetrievalError> for BatchError {
    fn from(e: RetrievalError) -> Self {
        BatchError::Upstream(e.to_string())
    }
}
