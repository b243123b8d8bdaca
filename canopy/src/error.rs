use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Oracle rate limit exceeded, retry after {retry_after:?} seconds")]
    OracleRateLimit { retry_after: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CanopyError>;
