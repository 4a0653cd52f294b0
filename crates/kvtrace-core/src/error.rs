use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("line {line}: no message id label found")]
    MarkerNotFound { line: usize },

    #[error("line {line}: message id truncated ({found} characters)")]
    TruncatedId { line: usize, found: usize },

    #[error("line {line}: invalid timestamp field {field:?}")]
    Timestamp { line: usize, field: String },

    #[error("line {line}: completion for unknown message {mid}")]
    UnknownMessage { line: usize, mid: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type ReconResult<T> = Result<T, ReconError>;
