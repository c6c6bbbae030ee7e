//! Threaded processor framework.
//!
//! - `ProcessorBackend`: the computation plus optional pulled-input hooks.
//! - `Processor<B>`: single-slot scheduler running a backend on a worker thread or inline.
//! - `ProcessorBase`: object-safe interface so runners can hold mixed backends.
//! - `ProcessorInput` / `ProcessorOutput`: mode-tagged envelopes routed by `ModeClass` id.

mod backend;
mod mode;
mod worker;

pub use backend::ProcessorBackend;
pub use mode::{ModeClass, ProcessorInput, ProcessorOutput};
pub use worker::{Processor, ProcessorBase, UpdateReturn, WAIT_POLL_INTERVAL};
