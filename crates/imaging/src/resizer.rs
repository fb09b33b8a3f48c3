use std::io::Cursor;

use async_trait::async_trait;
use rayon::prelude::*;

use cms_gallery::Image;

use crate::context::ProcessorContext;
use crate::error::ImagingError;
use crate::pipeline::Processor;

/// A named target size. `width`/`height` of 0 means "preserve aspect
/// ratio against the other dimension".
#[derive(Debug, Clone)]
pub struct SizeSpec {
    pub label: String,
    pub width: u32,
    pub height: u32,
}

/// Resizes the stack's original image into each configured size,
/// appending a derived `Image` per entry in ascending width order.
/// Per-size work runs in parallel via `rayon`; results are gathered by
/// index so the ascending order holds regardless of completion order.
pub struct Resizer {
    sizes: Vec<SizeSpec>,
}

impl Resizer {
    pub fn new(sizes: Vec<SizeSpec>) -> Self {
        Self { sizes }
    }
}

fn resolve_dimensions(orig_w: u32, orig_h: u32, want_w: u32, want_h: u32) -> (u32, u32) {
    match (want_w, want_h) {
        (0, 0) => (orig_w, orig_h),
        (0, h) => {
            let w = (orig_w as f64 * (h as f64 / orig_h as f64)).round().max(1.0) as u32;
            (w, h)
        }
        (w, 0) => {
            let h = (orig_h as f64 * (w as f64 / orig_w as f64)).round().max(1.0) as u32;
            (w, h)
        }
        (w, h) => (w, h),
    }
}

fn derived_path(original_path: &str, label: &str) -> String {
    match original_path.rfind('.') {
        Some(dot) => format!("{}_{}{}", &original_path[..dot], label, &original_path[dot..]),
        None => format!("{original_path}_{label}"),
    }
}

type ResizeOutput = (String, u32, u32, Vec<u8>);

fn resize_one(
    image_bytes: &[u8],
    format: image::ImageFormat,
    spec: &SizeSpec,
) -> Result<ResizeOutput, ImagingError> {
    let decoded = image::load_from_memory_with_format(image_bytes, format).map_err(|e| ImagingError::Decode(e.to_string()))?;
    let (target_w, target_h) = resolve_dimensions(decoded.width(), decoded.height(), spec.width, spec.height);
    let resized = decoded.resize(target_w, target_h, image::imageops::FilterType::Lanczos3);

    let mut buf = Vec::new();
    resized.write_to(&mut Cursor::new(&mut buf), format).map_err(|e| ImagingError::Encode(e.to_string()))?;

    Ok((spec.label.clone(), resized.width(), resized.height(), buf))
}

#[async_trait]
impl Processor for Resizer {
    fn name(&self) -> &'static str {
        "resizer"
    }

    async fn run(&self, ctx: &mut ProcessorContext) -> Result<(), ImagingError> {
        let original = ctx.stack().original().clone();
        let disk = ctx.object_store().disk(&original.disk)?;
        let bytes = disk.get(&original.path)?;
        let format = image::guess_format(&bytes).map_err(|e| ImagingError::Decode(e.to_string()))?;

        let sizes = self.sizes.clone();
        let outputs = tokio::task::spawn_blocking(move || -> Result<Vec<ResizeOutput>, ImagingError> {
            // rayon's collect on an indexed parallel iterator preserves
            // source order regardless of which task finishes first.
            let results: Vec<Result<ResizeOutput, ImagingError>> =
                sizes.par_iter().map(|spec| resize_one(&bytes, format, spec)).collect();

            let mut gathered = Vec::with_capacity(results.len());
            for result in results {
                gathered.push(result?);
            }
            gathered.sort_by_key(|(_, w, _, _)| *w);
            Ok(gathered)
        })
        .await
        .map_err(|e| ImagingError::Decode(e.to_string()))??;

        for (label, width, height, bytes) in outputs {
            let path = derived_path(&original.path, &label);
            disk.put(&path, bytes.clone())?;
            let size_bytes = bytes.len() as u64;
            let disk_name = original.disk.clone();
            ctx.update(move |mut stack| {
                stack.push_derived(Image { variant: label, disk: disk_name, path, width, height, size_bytes });
                stack
            })?;
        }

        Ok(())
    }
}
