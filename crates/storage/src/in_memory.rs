use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::disk::Disk;
use crate::error::StorageError;
use crate::object_store::ObjectStore;

#[derive(Debug)]
struct InMemoryDisk {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl Disk for InMemoryDisk {
    fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        self.blobs.write().expect("in-memory disk lock poisoned").insert(path.to_string(), bytes);
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .read()
            .expect("in-memory disk lock poisoned")
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        self.blobs
            .write()
            .expect("in-memory disk lock poisoned")
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::FileNotFound(path.to_string()))
    }
}

/// An `ObjectStore` backed entirely by memory, for tests and the demo
/// binary. Disks are created lazily on first reference.
pub struct InMemoryObjectStore {
    disks: RwLock<HashMap<String, Arc<InMemoryDisk>>>,
}

impl InMemoryObjectStore {
    pub fn new(disk_names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut disks = HashMap::new();
        for name in disk_names {
            disks.insert(name.into(), Arc::new(InMemoryDisk { blobs: RwLock::new(HashMap::new()) }));
        }
        Self { disks: RwLock::new(disks) }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self { disks: RwLock::new(HashMap::new()) }
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn disk(&self, name: &str) -> Result<Arc<dyn Disk>, StorageError> {
        self.disks
            .read()
            .expect("in-memory store lock poisoned")
            .get(name)
            .cloned()
            .map(|d| d as Arc<dyn Disk>)
            .ok_or_else(|| StorageError::Unconfigured(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_disk_is_rejected() {
        let store = InMemoryObjectStore::default();
        let err = store.disk("missing").unwrap_err();
        assert!(matches!(err, StorageError::Unconfigured(name) if name == "missing"));
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = InMemoryObjectStore::new(["uploads"]);
        let disk = store.disk("uploads").unwrap();
        disk.put("a/b.png", vec![1, 2, 3]).unwrap();
        assert_eq!(disk.get("a/b.png").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn get_after_delete_is_not_found() {
        let store = InMemoryObjectStore::new(["uploads"]);
        let disk = store.disk("uploads").unwrap();
        disk.put("a/b.png", vec![1, 2, 3]).unwrap();
        disk.delete("a/b.png").unwrap();
        assert!(matches!(disk.get("a/b.png"), Err(StorageError::FileNotFound(_))));
    }

    #[test]
    fn delete_of_missing_path_is_not_found() {
        let store = InMemoryObjectStore::new(["uploads"]);
        let disk = store.disk("uploads").unwrap();
        assert!(matches!(disk.delete("nope"), Err(StorageError::FileNotFound(_))));
    }
}
