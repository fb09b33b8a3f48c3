use crate::error::StorageError;

/// A single named disk: `put`/`get`/`delete` of opaque byte blobs at
/// arbitrary UTF-8 paths. Safe for concurrent calls across distinct
/// paths; same-path concurrent writes are undefined.
pub trait Disk: Send + Sync + std::fmt::Debug {
    fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError>;
    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;
    fn delete(&self, path: &str) -> Result<(), StorageError>;
}
