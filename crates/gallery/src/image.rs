use serde::{Deserialize, Serialize};

/// A single rendition of a stack: the uploaded original, or one the
/// post-processing pipeline derived from it. `(disk, path)` is the
/// storage identity; format is inferred from `path`'s extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// "original", or a derived-size label such as "w800".
    pub variant: String,
    pub disk: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl Image {
    pub fn is_original(&self) -> bool {
        self.variant == "original"
    }
}
