use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cms_gallery::{Stack, StackId};
use cms_storage::ObjectStore;

use crate::error::ImagingError;

/// What a `Processor` gets to see and mutate. `update` is the only way to
/// change the stack; it rejects any function that changes the stack's id.
pub struct ProcessorContext {
    stack: Stack,
    object_store: Arc<dyn ObjectStore>,
    cancellation: CancellationToken,
}

impl ProcessorContext {
    pub fn new(stack: Stack, object_store: Arc<dyn ObjectStore>, cancellation: CancellationToken) -> Self {
        Self { stack, object_store, cancellation }
    }

    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.object_store
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn update(&mut self, f: impl FnOnce(Stack) -> Stack) -> Result<(), ImagingError> {
        let id_before: StackId = self.stack.id();
        let updated = f(self.stack.clone());
        if updated.id() != id_before {
            return Err(ImagingError::StackCorrupted("update changed the stack id".to_string()));
        }
        self.stack = updated;
        Ok(())
    }

    pub fn into_stack(self) -> Stack {
        self.stack
    }
}
