//! Walks the content model end to end: create a shelf, upload a document,
//! create a gallery, upload an image, and watch the post-processor derive
//! resized/recompressed variants while the lookup index tracks names.
//!
//! There is no HTTP surface here — transport is out of scope for this
//! workspace. This binary exercises the same aggregate/repository/pipeline
//! machinery a transport layer would sit on top of.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde_json::Value as JsonValue;

use cms_core::AggregateId;
use cms_events::{EventBus, EventEnvelope, InMemoryEventBus, Projection};
use cms_gallery::{Gallery, GalleryCommand, Image, StackId};
use cms_imaging::{PngCompressor, ProcessingPipeline, Resizer};
use cms_infra::config::Config;
use cms_infra::event_store::InMemoryEventStore;
use cms_infra::lookup::{JsonToCmsEventBus, LookupIndex, LookupProjection};
use cms_infra::postprocessor::PostProcessor;
use cms_infra::repository::AggregateRepository;
use cms_infra::telemetry;
use cms_shelf::{Shelf, ShelfCommand};
use cms_storage::{InMemoryObjectStore, ObjectStore};

#[derive(Parser)]
#[command(name = "cms-demo")]
#[command(about = "End-to-end walkthrough of the shelf/gallery content model", long_about = None)]
struct Cli {
    /// Image compression level, 0 (fastest) through 9 (smallest).
    #[arg(long)]
    png_compression_level: Option<u8>,
}

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).expect("encoding a blank png never fails");
    buf
}

fn png_compression(level: u8) -> image::codecs::png::CompressionType {
    use image::codecs::png::CompressionType;
    match level {
        0..=2 => CompressionType::Fast,
        3..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(level) = cli.png_compression_level {
        config.png_compression_level = level;
    }

    let object_store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new(config.disk_roots.iter().map(|(name, _)| name.clone())));

    let event_bus = Arc::new(InMemoryEventBus::<EventEnvelope<JsonValue>>::new());
    let event_store = InMemoryEventStore::new();
    let repository = Arc::new(AggregateRepository::new(event_store, Arc::clone(&event_bus)));

    let lookup = Arc::new(LookupIndex::new());
    spawn_lookup_pump(Arc::clone(&event_bus), Arc::clone(&lookup));

    let pipeline = Arc::new(ProcessingPipeline::new(vec![
        Box::new(Resizer::new(config.resize_sizes.clone())),
        Box::new(PngCompressor::new(png_compression(config.png_compression_level))),
    ]));

    let postprocessor = PostProcessor::new(Arc::clone(&repository), Arc::clone(&pipeline), Arc::clone(&object_store), config.postprocessor_workers)
        .on_processed(Arc::new(|gallery_id, stack_id| {
            tracing::info!(%gallery_id, %stack_id, "post-processor finished a stack");
        }));
    let mut handle = postprocessor.spawn(&event_bus, 64);

    let shelf_id = AggregateId::new();
    repository.use_aggregate::<Shelf, _>(shelf_id, "shelf", |loaded| {
        loaded.handle(&ShelfCommand::Create { name: "Invoices".to_string(), occurred_at: chrono::Utc::now() })
    })?;

    let document_id = cms_shelf::DocumentId::new();
    object_store.disk("documents")?.put("invoices/2026-01.pdf", b"%PDF-1.4 demo".to_vec())?;
    repository.use_aggregate::<Shelf, _>(shelf_id, "shelf", |loaded| {
        loaded.handle(&ShelfCommand::AddDocument {
            document_id,
            name: "January invoice".to_string(),
            unique_name: Some("jan-2026-invoice".to_string()),
            disk: "documents".to_string(),
            path: "invoices/2026-01.pdf".to_string(),
            size_bytes: 13,
            occurred_at: chrono::Utc::now(),
        })
    })?;
    tracing::info!(%shelf_id, %document_id, "added a document to the shelf");

    let gallery_id = AggregateId::new();
    repository.use_aggregate::<Gallery, _>(gallery_id, "gallery", |loaded| {
        loaded.handle(&GalleryCommand::Create { name: "Trip photos".to_string(), occurred_at: chrono::Utc::now() })
    })?;

    let stack_id = StackId::new();
    let original_bytes = encode_png(1600, 900);
    object_store.disk("images")?.put("trip/sunset.png", original_bytes)?;
    let original = Image {
        variant: "original".to_string(),
        disk: "images".to_string(),
        path: "trip/sunset.png".to_string(),
        width: 1600,
        height: 900,
        size_bytes: 0,
    };
    repository.use_aggregate::<Gallery, _>(gallery_id, "gallery", |loaded| {
        loaded.handle(&GalleryCommand::UploadImage { stack_id, original_name: "sunset.png".to_string(), original, occurred_at: chrono::Utc::now() })
    })?;
    tracing::info!(%gallery_id, %stack_id, "uploaded an image to the gallery");

    // Post-processing runs on a background worker; give it a moment, then
    // report what it produced and what the lookup index now knows.
    tokio::time::sleep(Duration::from_millis(500)).await;
    if let Ok(Some(error)) = tokio::time::timeout(Duration::from_millis(10), handle.next_error()).await {
        tracing::warn!(?error, "post-processor reported an error");
    }

    let loaded_gallery = repository.load::<Gallery>(gallery_id)?;
    if let Some(stack) = loaded_gallery.aggregate().stack(stack_id) {
        for image in stack.images() {
            tracing::info!(variant = %image.variant, path = %image.path, width = image.width, height = image.height, "stack variant");
        }
    }

    tracing::info!(
        resolved_shelf = ?lookup.shelf_id("Invoices"),
        resolved_document = ?lookup.document_id(shelf_id, "jan-2026-invoice"),
        resolved_gallery = ?lookup.gallery_id("Trip photos"),
        resolved_stack = ?lookup.stack_id(gallery_id, "sunset.png"),
        "lookup index resolved the names back to ids"
    );

    handle.shutdown().await;
    Ok(())
}

fn spawn_lookup_pump(bus: Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>, index: Arc<LookupIndex>) {
    let bridge = JsonToCmsEventBus::new(bus);
    let subscription = bridge.subscribe();
    std::thread::spawn(move || {
        let mut projection = LookupProjection(index);
        while let Ok(envelope) = subscription.recv() {
            projection.apply(&envelope);
        }
    });
}
