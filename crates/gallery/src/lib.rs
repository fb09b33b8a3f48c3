//! Gallery aggregate: a named, ordered collection of image stacks.

pub mod gallery;
pub mod image;
pub mod stack;

pub use gallery::{Gallery, GalleryCommand, GalleryEvent};
pub use image::Image;
pub use stack::{Stack, StackId};
