use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by asset storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed to perform an I/O operation.
    #[error("storage I/O failed: {message}")]
    Io {
        /// What was being attempted.
        message: String,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A namespace with this id already exists.
    #[error("namespace `{0}` already exists")]
    NamespaceCollision(String),
    /// The namespace id is not a single plain path segment.
    #[error("invalid namespace id `{0}`")]
    InvalidNamespace(String),
}

impl StorageError {
    /// Construct an I/O error from any backend failure.
    pub fn io(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Io {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
