use super::mode::ModeClass;

/// The computation a `Processor` schedules.
///
/// # Contract
///
/// `process` takes `&self` and is called from the worker thread (or from the caller of
/// `Processor::update` when running synchronously) while the processor's input slot is
/// locked. It MUST NOT depend on mutable processor state; anything it reads is shared
/// read-only with the thread that owns the processor.
///
/// Backends that pull their own input (`has_async_input() == true`) implement
/// `async_acquire_input`, which may block, and `async_wake`, which MUST unblock a
/// pending `async_acquire_input`. `Processor::stop` joins the worker thread after calling
/// `async_wake`, so an acquisition that ignores the wake hangs `stop`.
pub trait ProcessorBackend: Send + Sync + 'static {
    type Mode: ModeClass;
    type Input: Send + Sync + 'static;
    type Output: Send + Sync + 'static;

    /// Routing key. Inputs whose mode differs are ignored.
    const MODE: Self::Mode;

    /// Backend identifier, used for thread names and logs.
    fn name(&self) -> &'static str;

    fn process(&self, input: &Self::Input) -> Self::Output;

    /// Whether this backend acquires its own input instead of receiving it through `update`.
    fn has_async_input(&self) -> bool {
        false
    }

    /// Block until new input is available.
    ///
    /// Returns `None` when acquisition was aborted, e.g. because `async_wake` was called
    /// during shutdown.
    fn async_acquire_input(&self) -> Option<Self::Input> {
        None
    }

    /// Unblock any pending `async_acquire_input`.
    fn async_wake(&self) {}
}
