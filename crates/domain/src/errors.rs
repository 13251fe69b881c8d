use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Decode error: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Encode error: {0}")]
    Encode(#[source] serde_json::Error),
}
