//! Query log writer errors.

/// Reasons a writer could not be created.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid target '{0}'")]
    InvalidTarget(String),
}

pub type WriterResult<T> = Result<T, WriterError>;
