//! Shelf aggregate: a named collection of uploaded documents.

pub mod document;
pub mod search;
pub mod shelf;

pub use document::{Document, DocumentId};
pub use search::Search;
pub use shelf::{Shelf, ShelfCommand, ShelfEvent};
