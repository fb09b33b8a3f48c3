use async_trait::async_trait;

use cms_gallery::Stack;

use crate::context::ProcessorContext;
use crate::error::ImagingError;

/// One step in a `ProcessingPipeline`.
#[async_trait]
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut ProcessorContext) -> Result<(), ImagingError>;
}

/// An ordered chain of `Processor`s run sequentially over a `Stack`. The
/// first error aborts the chain and is returned with the processor's
/// index; the returned stack is whatever the context held at that point.
pub struct ProcessingPipeline {
    processors: Vec<Box<dyn Processor>>,
}

impl ProcessingPipeline {
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors }
    }

    pub async fn run(&self, mut ctx: ProcessorContext) -> Result<Stack, (usize, ImagingError)> {
        for (index, processor) in self.processors.iter().enumerate() {
            if ctx.cancellation().is_cancelled() {
                return Err((index, ImagingError::Cancelled));
            }

            tracing::debug!(processor = processor.name(), index, "running processor");
            if let Err(err) = processor.run(&mut ctx).await {
                tracing::warn!(processor = processor.name(), index, error = %err, "processor failed");
                return Err((index, err));
            }
        }

        Ok(ctx.into_stack())
    }
}
