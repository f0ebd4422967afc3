//! Error types for news storage

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid news id: {0}")]
    InvalidId(String),

    #[error("store parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for repository operations.
pub type Result<T> = std::result::Result<T, Error>;
