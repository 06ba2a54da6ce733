use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Repository initialization failed: {message}")]
    InitializationError { message: String },
}

impl RepositoryError {
    /// True when the durable record exists but cannot be decoded. The
    /// loader treats this as a recoverable condition and starts from an
    /// empty set instead of failing startup.
    pub fn is_corrupt_record(&self) -> bool {
        matches!(self, RepositoryError::SerializationError(_))
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
