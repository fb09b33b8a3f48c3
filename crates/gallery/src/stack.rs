use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cms_core::impl_uuid_newtype;

use crate::image::Image;

/// Identifier of a stack within a gallery.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(Uuid);

impl_uuid_newtype!(StackId, "StackId");

/// A stack is one logical image and every rendition derived from it: the
/// original upload plus whatever the post-processing pipeline produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    id: StackId,
    original_name: String,
    images: Vec<Image>,
    /// Insertion-ordered, deduplicated: the first tag added stays first.
    tags: Vec<String>,
}

impl Stack {
    pub fn new(id: StackId, original_name: impl Into<String>, original: Image) -> Self {
        Self {
            id,
            original_name: original_name.into(),
            images: vec![original],
            tags: Vec::new(),
        }
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn original(&self) -> &Image {
        self.images
            .iter()
            .find(|i| i.is_original())
            .expect("stack invariant: an original image always exists")
    }

    pub fn images(&self) -> &[Image] {
        &self.images
    }

    pub fn variant(&self, variant: &str) -> Option<&Image> {
        self.images.iter().find(|i| i.variant == variant)
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.original_name = name;
    }

    /// Reset the stack to hold only `original` — used by `ImageReplaced`.
    /// The old derived renditions are discarded rather than re-derived in
    /// place.
    pub fn reset_to(&mut self, original: Image) {
        self.images = vec![original];
    }

    /// Append a derived rendition, replacing any existing image of the
    /// same variant. Public so processing pipelines can build the
    /// `Stack → Stack` transform `ProcessorContext::update` expects.
    pub fn push_derived(&mut self, image: Image) {
        self.images.retain(|i| i.variant != image.variant);
        self.images.push(image);
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
