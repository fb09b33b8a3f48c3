use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cms_core::impl_uuid_newtype;

/// Identifier of a document within a shelf.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl_uuid_newtype!(DocumentId, "DocumentId");

/// A single uploaded file tracked by a `Shelf`.
///
/// `(disk, path)` is the storage identity: the raw bytes live in the
/// object store at that address, the document itself never holds bytes
/// in memory once uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    name: String,
    unique_name: Option<String>,
    disk: String,
    path: String,
    size_bytes: u64,
    /// Insertion-ordered, deduplicated: the first tag added stays first.
    tags: Vec<String>,
}

impl Document {
    pub fn new(
        id: DocumentId,
        name: impl Into<String>,
        disk: impl Into<String>,
        path: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            unique_name: None,
            disk: disk.into(),
            path: path.into(),
            size_bytes,
            tags: Vec::new(),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unique_name(&self) -> Option<&str> {
        self.unique_name.as_deref()
    }

    pub fn is_unique(&self) -> bool {
        self.unique_name.is_some()
    }

    pub fn disk(&self) -> &str {
        &self.disk
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_unique_name(&mut self, unique_name: Option<String>) {
        self.unique_name = unique_name;
    }

    pub(crate) fn replace_content(&mut self, disk: String, path: String, size_bytes: u64) {
        self.disk = disk;
        self.path = path;
        self.size_bytes = size_bytes;
    }

    pub(crate) fn add_tag(&mut self, tag: String) {
        if !self.has_tag(&tag) {
            self.tags.push(tag);
        }
    }

    pub(crate) fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|t| t != tag);
    }
}
