use thiserror::Error;

/// Errors that can occur during embedding operations
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Service unreachable or still warming up; worth a start + wait + retry
    #[error("Embedding service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The service answered with a non-success status
    #[error("Embedding request failed: {status} - {body}")]
    Request { status: u16, body: String },

    /// The response body was not an embedding
    #[error("Invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Invalid input provided to the pipeline
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The service process could not be started or died during start-up
    #[error("Failed to start embedding service: {0}")]
    Spawn(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_))
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            EmbeddingError::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            EmbeddingError::InvalidResponse(err.to_string())
        } else {
            EmbeddingError::Request {
                status: err.status().map_or(0, |status| status.as_u16()),
                body: err.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;
