use thiserror::Error;

/// Failure modes of the object-store boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("disk '{0}' is not configured")]
    Unconfigured(String),

    #[error("object not found at path '{0}'")]
    FileNotFound(String),

    #[error("object store io error: {0}")]
    Io(#[from] std::io::Error),
}
