//! Error types for store operations

/// Errors from the credential, profile and blob stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
