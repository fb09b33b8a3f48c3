use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::disk::Disk;
use crate::error::StorageError;
use crate::object_store::ObjectStore;

#[derive(Debug)]
struct FsDisk {
    root: PathBuf,
}

impl FsDisk {
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Disk for FsDisk {
    fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(full, bytes)?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.resolve(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::FileNotFound(path.to_string()),
            _ => StorageError::Io(e),
        })
    }

    fn delete(&self, path: &str) -> Result<(), StorageError> {
        fs::remove_file(self.resolve(path)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StorageError::FileNotFound(path.to_string()),
            _ => StorageError::Io(e),
        })
    }
}

/// An `ObjectStore` backed by the local filesystem, one root directory
/// per named disk.
pub struct DiskObjectStore {
    disks: HashMap<String, Arc<FsDisk>>,
}

impl DiskObjectStore {
    pub fn new(roots: impl IntoIterator<Item = (impl Into<String>, impl Into<PathBuf>)>) -> Self {
        let disks = roots
            .into_iter()
            .map(|(name, root)| (name.into(), Arc::new(FsDisk { root: root.into() })))
            .collect();
        Self { disks }
    }
}

impl ObjectStore for DiskObjectStore {
    fn disk(&self, name: &str) -> Result<Arc<dyn Disk>, StorageError> {
        self.disks.get(name).cloned().map(|d| d as Arc<dyn Disk>).ok_or_else(|| StorageError::Unconfigured(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete_round_trip_through_the_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskObjectStore::new([("uploads", dir.path().to_path_buf())]);
        let disk = store.disk("uploads").unwrap();

        disk.put("nested/file.bin", vec![9, 9, 9]).unwrap();
        assert_eq!(disk.get("nested/file.bin").unwrap(), vec![9, 9, 9]);

        disk.delete("nested/file.bin").unwrap();
        assert!(matches!(disk.get("nested/file.bin"), Err(StorageError::FileNotFound(_))));
    }

    #[test]
    fn unconfigured_disk_is_rejected() {
        let store = DiskObjectStore::new(Vec::<(String, PathBuf)>::new());
        assert!(matches!(store.disk("uploads"), Err(StorageError::Unconfigured(_))));
    }
}
