use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

impl From<hex::FromHexError> for StorageError {
    fn from(e: hex::FromHexError) -> Self {
        StorageError::Deserialization(e.to_string())
    }
}
