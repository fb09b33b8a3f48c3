use std::sync::Arc;

use crate::disk::Disk;
use crate::error::StorageError;

/// Resolves named disks. The core never talks to a disk directly; it
/// asks the store for one by name and fails with `Unconfigured` if the
/// name is unknown.
pub trait ObjectStore: Send + Sync {
    fn disk(&self, name: &str) -> Result<Arc<dyn Disk>, StorageError>;
}
