//! Post-processing worker pool.
//!
//! Tails `gallery.image_uploaded` / `gallery.image_replaced` off the shared
//! bus, runs each stack's original image through a `ProcessingPipeline`, and
//! commits the resulting derived images back onto the gallery aggregate.
//! Each job is isolated: one job's failure neither blocks nor retries
//! others.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use cms_core::{AggregateId, CmsError};
use cms_events::{EventBus, EventEnvelope};
use cms_gallery::{Gallery, GalleryCommand, GalleryEvent, Image, StackId};
use cms_imaging::{ImagingError, ProcessingPipeline, ProcessorContext};
use cms_storage::ObjectStore;

use crate::event_store::EventStore;
use crate::repository::{AggregateRepository, RepositoryError};

/// One stack's original image, ready to run through the pipeline.
#[derive(Debug, Clone)]
pub struct Job {
    pub gallery_id: AggregateId,
    pub stack_id: StackId,
}

#[derive(Debug)]
pub enum PostProcessorError {
    Pipeline { job: Job, index: usize, error: ImagingError },
    Commit { job: Job, error: RepositoryError<CmsError> },
}

fn decode_gallery_event(env: &EventEnvelope<JsonValue>) -> Option<GalleryEvent> {
    if env.aggregate_type() != "gallery" {
        return None;
    }
    serde_json::from_value::<GalleryEvent>(env.payload().clone()).ok()
}

fn job_from_event(aggregate_id: AggregateId, event: &GalleryEvent) -> Option<Job> {
    match event {
        GalleryEvent::ImageUploaded(e) => Some(Job { gallery_id: aggregate_id, stack_id: e.stack_id }),
        GalleryEvent::ImageReplaced(e) => Some(Job { gallery_id: aggregate_id, stack_id: e.stack_id }),
        _ => None,
    }
}

/// Worker pool that drives the imaging pipeline off the gallery event
/// stream. `S`/`B` match `AggregateRepository`'s own bounds; the pool holds
/// its own `Arc` to the repository so it can be run alongside request
/// handling against the same store and bus.
pub struct PostProcessor<S, B> {
    repository: Arc<AggregateRepository<S, B>>,
    pipeline: Arc<ProcessingPipeline>,
    object_store: Arc<dyn ObjectStore>,
    worker_count: usize,
    on_processed: Option<Arc<dyn Fn(AggregateId, StackId) + Send + Sync>>,
}

impl<S, B> PostProcessor<S, B>
where
    S: EventStore + Send + Sync + 'static,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync + 'static,
{
    pub fn new(
        repository: Arc<AggregateRepository<S, B>>,
        pipeline: Arc<ProcessingPipeline>,
        object_store: Arc<dyn ObjectStore>,
        worker_count: usize,
    ) -> Self {
        Self {
            repository,
            pipeline,
            object_store,
            worker_count: worker_count.max(1),
            on_processed: None,
        }
    }

    pub fn on_processed(mut self, callback: Arc<dyn Fn(AggregateId, StackId) + Send + Sync>) -> Self {
        self.on_processed = Some(callback);
        self
    }

    /// Spawns the pump thread and the worker pool. Returns a handle whose
    /// `cancellation` token stops every in-flight job when cancelled, and
    /// an error receiver for jobs that failed.
    pub fn spawn(self, bus: &B, queue_capacity: usize) -> PostProcessorHandle {
        let root_cancellation = CancellationToken::new();
        let (job_tx, job_rx) = mpsc::channel::<Job>(queue_capacity.max(1));
        let (error_tx, error_rx) = mpsc::unbounded_channel::<PostProcessorError>();

        let subscription = bus.subscribe();
        std::thread::spawn(move || {
            while let Ok(env) = subscription.recv() {
                let aggregate_id = env.aggregate_id();
                if let Some(event) = decode_gallery_event(&env) {
                    if let Some(job) = job_from_event(aggregate_id, &event) {
                        if job_tx.blocking_send(job).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let job_rx = Arc::new(Mutex::new(job_rx));
        let repository = self.repository;
        let pipeline = self.pipeline;
        let object_store = self.object_store;
        let on_processed = self.on_processed;

        let mut workers = Vec::with_capacity(self.worker_count);
        for _ in 0..self.worker_count {
            let job_rx = Arc::clone(&job_rx);
            let repository = Arc::clone(&repository);
            let pipeline = Arc::clone(&pipeline);
            let object_store = Arc::clone(&object_store);
            let on_processed = on_processed.clone();
            let error_tx = error_tx.clone();
            let cancellation = root_cancellation.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let job = tokio::select! {
                        _ = cancellation.cancelled() => break,
                        job = async { job_rx.lock().await.recv().await } => match job {
                            Some(job) => job,
                            None => break,
                        },
                    };

                    if let Err(error) = process_job(&repository, &pipeline, &object_store, &cancellation, job.clone()).await {
                        let _ = error_tx.send(error);
                        continue;
                    }

                    if let Some(callback) = &on_processed {
                        callback(job.gallery_id, job.stack_id);
                    }
                }
            }));
        }

        PostProcessorHandle { cancellation: root_cancellation, workers, errors: error_rx }
    }
}

async fn process_job<S, B>(
    repository: &AggregateRepository<S, B>,
    pipeline: &ProcessingPipeline,
    object_store: &Arc<dyn ObjectStore>,
    root_cancellation: &CancellationToken,
    job: Job,
) -> Result<(), PostProcessorError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let loaded = repository.load::<Gallery>(job.gallery_id).map_err(|error| PostProcessorError::Commit { job: job.clone(), error })?;
    let stack = match loaded.aggregate().stack(job.stack_id) {
        Some(stack) => stack.clone(),
        None => return Ok(()),
    };
    let known_variants: Vec<String> = stack.images().iter().map(|i| i.variant.clone()).collect();

    let job_cancellation = root_cancellation.child_token();
    let ctx = ProcessorContext::new(stack, Arc::clone(object_store), job_cancellation);

    let processed_stack = pipeline.run(ctx).await.map_err(|(index, error)| PostProcessorError::Pipeline { job: job.clone(), index, error })?;

    let derived: Vec<Image> = processed_stack.images().into_iter().filter(|i| !known_variants.contains(&i.variant)).cloned().collect();

    if derived.is_empty() {
        return Ok(());
    }

    repository
        .use_aggregate::<Gallery, _>(job.gallery_id, "gallery", |loaded| {
            for image in derived {
                loaded.handle(&GalleryCommand::AppendDerivedImage { stack_id: job.stack_id, image, occurred_at: Utc::now() })?;
            }
            Ok(())
        })
        .map_err(|error| PostProcessorError::Commit { job, error })
}

pub struct PostProcessorHandle {
    cancellation: CancellationToken,
    workers: Vec<tokio::task::JoinHandle<()>>,
    errors: mpsc::UnboundedReceiver<PostProcessorError>,
}

impl PostProcessorHandle {
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub async fn next_error(&mut self) -> Option<PostProcessorError> {
        self.errors.recv().await
    }

    pub async fn shutdown(self) {
        self.cancellation.cancel();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_from_event_ignores_unrelated_gallery_events() {
        let gallery_id = AggregateId::new();
        let event = GalleryEvent::StackDeleted(cms_gallery::gallery::StackDeleted { stack_id: StackId::new(), occurred_at: Utc::now() });
        assert!(job_from_event(gallery_id, &event).is_none());
    }

    #[test]
    fn job_from_event_extracts_the_stack_on_upload() {
        let gallery_id = AggregateId::new();
        let stack_id = StackId::new();
        let original = Image { variant: "original".to_string(), disk: "images".to_string(), path: "k".to_string(), width: 1, height: 1, size_bytes: 1 };
        let event = GalleryEvent::ImageUploaded(cms_gallery::gallery::ImageUploaded {
            stack_id,
            original_name: "a.png".to_string(),
            original,
            occurred_at: Utc::now(),
        });
        let job = job_from_event(gallery_id, &event).unwrap();
        assert_eq!(job.gallery_id, gallery_id);
        assert_eq!(job.stack_id, stack_id);
    }
}
