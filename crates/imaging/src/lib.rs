//! Image post-processing pipeline: header-only decode, resize, recompress.

pub mod context;
pub mod decode;
pub mod error;
pub mod pipeline;
pub mod png_compressor;
pub mod resizer;

pub use context::ProcessorContext;
pub use decode::{decode_metadata, ImageMetadata};
pub use error::ImagingError;
pub use pipeline::{Processor, ProcessingPipeline};
pub use png_compressor::PngCompressor;
pub use resizer::{Resizer, SizeSpec};
