//! Mode routing keys and the type-erased input/output envelopes.
//!
//! A processor is identified by one value of a `ModeClass` enum. Inputs and outputs
//! travel through the runner as `ProcessorInput` / `ProcessorOutput`, which carry the
//! mode id next to an erased payload. Both are built through the backend type, so the
//! payload type for a mode is fixed at compile time.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use super::backend::ProcessorBackend;

/// Enum whose values identify processors.
///
/// Every value must map to a distinct `u32`; runners reject two processors with the same id.
pub trait ModeClass: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    fn id(self) -> u32;
}

type Payload = Arc<dyn Any + Send + Sync>;

/// Input addressed to the processor running backend `B`.
#[derive(Clone)]
pub struct ProcessorInput {
    mode: u32,
    payload: Payload,
}

impl ProcessorInput {
    pub fn new<B: ProcessorBackend>(input: B::Input) -> Self {
        Self {
            mode: B::MODE.id(),
            payload: Arc::new(input),
        }
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub(crate) fn payload<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }
}

impl fmt::Debug for ProcessorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorInput")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Output produced by a processor, shared with whoever retrieved it.
#[derive(Clone)]
pub struct ProcessorOutput {
    mode: u32,
    payload: Payload,
}

impl ProcessorOutput {
    pub(crate) fn new<B: ProcessorBackend>(output: Arc<B::Output>) -> Self {
        Self {
            mode: B::MODE.id(),
            payload: output,
        }
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Typed view of the output if it came from backend `B`.
    pub fn downcast<B: ProcessorBackend>(&self) -> Option<Arc<B::Output>> {
        if self.mode != B::MODE.id() {
            return None;
        }
        self.payload.clone().downcast::<B::Output>().ok()
    }
}

impl fmt::Debug for ProcessorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorOutput")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
