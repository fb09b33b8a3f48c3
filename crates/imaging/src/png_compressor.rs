use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::ImageEncoder;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use cms_gallery::Image;
use cms_storage::Disk;

use crate::context::ProcessorContext;
use crate::error::ImagingError;
use crate::pipeline::Processor;

/// Re-encodes every image in the stack with a fixed PNG compression
/// level, in place. Images are processed concurrently; the first error
/// cancels the rest of the batch via the context's cancellation token.
pub struct PngCompressor {
    compression: CompressionType,
}

impl PngCompressor {
    pub fn new(compression: CompressionType) -> Self {
        Self { compression }
    }
}

fn recompress(bytes: &[u8], compression: CompressionType) -> Result<Vec<u8>, ImagingError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;
    let mut out = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilterType::Adaptive);
    encoder
        .write_image(decoded.as_bytes(), decoded.width(), decoded.height(), decoded.color())
        .map_err(|e| ImagingError::Encode(e.to_string()))?;
    Ok(out)
}

async fn recompress_one(
    disk: Arc<dyn Disk>,
    image: Image,
    compression: CompressionType,
    cancellation: CancellationToken,
) -> Result<Image, ImagingError> {
    let bytes = disk.get(&image.path)?;
    let compression_copy = compression;
    let recompressed = tokio::task::spawn_blocking(move || recompress(&bytes, compression_copy))
        .await
        .map_err(|e| ImagingError::Encode(e.to_string()))??;

    if cancellation.is_cancelled() {
        return Err(ImagingError::Cancelled);
    }

    let size_bytes = recompressed.len() as u64;
    disk.put(&image.path, recompressed)?;

    Ok(Image { size_bytes, ..image })
}

#[async_trait]
impl Processor for PngCompressor {
    fn name(&self) -> &'static str {
        "png_compressor"
    }

    async fn run(&self, ctx: &mut ProcessorContext) -> Result<(), ImagingError> {
        let disk = ctx.object_store().disk(&ctx.stack().original().disk)?;
        let images = ctx.stack().images().to_vec();
        let cancellation = ctx.cancellation().clone();

        let mut joins = JoinSet::new();
        for image in images {
            joins.spawn(recompress_one(disk.clone(), image, self.compression, cancellation.clone()));
        }

        let mut updated = Vec::new();
        let mut first_error: Option<ImagingError> = None;
        while let Some(result) = joins.join_next().await {
            match result {
                Ok(Ok(image)) => updated.push(image),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        cancellation.cancel();
                        first_error = Some(e);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        cancellation.cancel();
                        first_error = Some(ImagingError::Encode(join_err.to_string()));
                    }
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        ctx.update(move |mut stack| {
            for image in updated {
                // `push_derived` replaces by variant, which also covers
                // the original's "original" variant.
                stack.push_derived(image);
            }
            stack
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cms_gallery::{Stack, StackId};
    use cms_storage::{InMemoryObjectStore, ObjectStore};

    use super::*;

    fn encode_png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::new(width, height);
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
        buf
    }

    #[tokio::test]
    async fn recompresses_every_image_in_the_stack() {
        let store = Arc::new(InMemoryObjectStore::new(["images"]));
        store.disk("images").unwrap().put("a/original.png", encode_png(32, 32)).unwrap();
        store.disk("images").unwrap().put("a/original_small.png", encode_png(16, 16)).unwrap();

        let mut stack = Stack::new(
            StackId::new(),
            "a",
            Image { variant: "original".to_string(), disk: "images".to_string(), path: "a/original.png".to_string(), width: 32, height: 32, size_bytes: 1 },
        );
        stack.push_derived(Image { variant: "small".to_string(), disk: "images".to_string(), path: "a/original_small.png".to_string(), width: 16, height: 16, size_bytes: 1 });

        let mut ctx = ProcessorContext::new(stack, store.clone(), CancellationToken::new());
        let compressor = PngCompressor::new(CompressionType::Best);
        compressor.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.stack().images().len(), 2);
        assert!(store.disk("images").unwrap().get("a/original.png").is_ok());
    }
}
