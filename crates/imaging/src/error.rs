use thiserror::Error;

use cms_storage::StorageError;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("object store error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("processor update corrupted the stack: {0}")]
    StackCorrupted(String),

    #[error("processing was cancelled")]
    Cancelled,
}
