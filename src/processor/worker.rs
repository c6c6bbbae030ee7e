//! Single-slot processor state machine.
//!
//! A `Processor` owns at most one pending input. `update` never blocks: it retrieves the
//! output of the previous input if it is finished, and hands over a new input only when
//! the slot is free. While the worker holds the slot to process, `update` reports
//! `still_processing_prev_input` and the new input is dropped; callers resubmit on their
//! next tick.
//!
//! In asynchronous mode a dedicated thread runs the processing loop. In synchronous
//! mode no thread exists and `update` runs one loop iteration on the caller's thread.

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::backend::ProcessorBackend;
use super::mode::{ModeClass, ProcessorInput, ProcessorOutput};

/// Sleep between checks in `wait_for_start` / `wait_until_done`.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of one `update` call.
#[derive(Clone, Debug, Default)]
pub struct UpdateReturn {
    /// Output of the previously submitted input, if it finished since the last retrieval.
    pub output: Option<ProcessorOutput>,
    /// New input was accepted and the worker signalled (or, when synchronous, processed inline).
    pub notified_of_input: bool,
    /// The worker was busy with the previous input; nothing was submitted.
    pub still_processing_prev_input: bool,
}

impl UpdateReturn {
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }
}

/// Object-safe face of a processor, used by runners to drive heterogeneous backends.
pub trait ProcessorBase: Send + Sync {
    fn mode(&self) -> u32;
    fn name(&self) -> &'static str;
    fn has_async_input(&self) -> bool;
    fn start(&self) -> Result<()>;
    fn stop(&self);
    fn set_is_synchronous(&self, synchronous: bool) -> Result<()>;
    fn update(&self, input: Option<&ProcessorInput>) -> UpdateReturn;
    fn is_running(&self) -> bool;
    fn is_running_synchronously(&self) -> bool;
    fn wait_for_start(&self);
    fn wait_until_done(&self);
}

struct Slot<B: ProcessorBackend> {
    input: Option<Arc<B::Input>>,
    output: Option<Arc<B::Output>>,
    input_ready: bool,
    processing_done: bool,
}

struct Shared<B: ProcessorBackend> {
    backend: B,
    slot: Mutex<Slot<B>>,
    input_cv: Condvar,
    running: AtomicBool,
    thread_started: AtomicBool,
    synchronous: AtomicBool,
}

impl<B: ProcessorBackend> Shared<B> {
    fn processor_loop(&self) {
        log::debug!("processor {}: worker thread running", self.backend.name());
        if self.backend.has_async_input() {
            // No condition-variable wait happens for pulled input; ready once looping.
            self.thread_started.store(true, Ordering::SeqCst);
        }
        loop {
            self.run_iteration();
            if !self.running.load(Ordering::SeqCst) || self.synchronous.load(Ordering::SeqCst) {
                break;
            }
        }
        log::debug!("processor {}: worker thread exiting", self.backend.name());
    }

    /// One pass of the loop body. Runs on the worker thread, or inline when synchronous.
    fn run_iteration(&self) {
        let has_async_input = self.backend.has_async_input();
        // Acquisition may block, so it happens outside the slot lock.
        let acquired = if has_async_input {
            self.backend.async_acquire_input()
        } else {
            None
        };

        let mut slot = self.slot.lock();
        if let Some(input) = acquired {
            slot.input = Some(Arc::new(input));
            slot.processing_done = false;
        }
        self.process_pending(&mut slot);

        if !has_async_input && !self.synchronous.load(Ordering::SeqCst) {
            self.thread_started.store(true, Ordering::SeqCst);
            while !slot.input_ready && self.running.load(Ordering::SeqCst) {
                self.input_cv.wait(&mut slot);
            }
        }
    }

    /// Process the slot's input unless its output is already computed.
    fn process_pending(&self, slot: &mut Slot<B>) {
        if slot.processing_done {
            return;
        }
        if let Some(input) = slot.input.clone() {
            slot.input_ready = false;
            let output = self.backend.process(&input);
            slot.output = Some(Arc::new(output));
            slot.processing_done = true;
        }
    }
}

/// Runs backend `B` on its own thread or on the caller's thread.
pub struct Processor<B: ProcessorBackend> {
    shared: Arc<Shared<B>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<B: ProcessorBackend> Processor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                slot: Mutex::new(Slot {
                    input: None,
                    output: None,
                    input_ready: false,
                    processing_done: true,
                }),
                input_cv: Condvar::new(),
                running: AtomicBool::new(false),
                thread_started: AtomicBool::new(false),
                synchronous: AtomicBool::new(false),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    pub fn mode(&self) -> B::Mode {
        B::MODE
    }

    pub fn name(&self) -> &'static str {
        self.shared.backend.name()
    }

    pub fn has_async_input(&self) -> bool {
        self.shared.backend.has_async_input()
    }

    /// Start processing. No effect if already running.
    ///
    /// Spawns the worker thread unless the processor is synchronous. A failed spawn
    /// leaves the processor stopped.
    pub fn start(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.shared.synchronous.load(Ordering::SeqCst) {
            log::debug!("processor {}: started synchronously", self.name());
            return Ok(());
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("processor-{}", self.name()))
            .spawn(move || shared.processor_loop())
            .with_context(|| format!("spawn worker thread for processor {}", self.name()));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                log::debug!("processor {}: started", self.name());
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Stop processing and join the worker thread. No effect if not running.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }

        // Taking the slot lock orders the flag change before the worker's next wait check.
        drop(self.shared.slot.lock());
        self.shared.input_cv.notify_all();
        self.shared.backend.async_wake();

        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                log::error!("processor {}: worker thread panicked", self.name());
            }
        }

        self.shared.slot.lock().input_ready = false;
        self.shared.thread_started.store(false, Ordering::SeqCst);
        log::debug!("processor {}: stopped", self.name());
    }

    /// Switch between synchronous and threaded execution, restarting if running.
    pub fn set_is_synchronous(&self, synchronous: bool) -> Result<()> {
        if self.shared.synchronous.load(Ordering::SeqCst) == synchronous {
            return Ok(());
        }
        let was_running = self.is_running();
        self.stop();
        self.shared.synchronous.store(synchronous, Ordering::SeqCst);
        log::info!(
            "processor {}: now running {}",
            self.name(),
            if synchronous {
                "synchronously"
            } else {
                "on its own thread"
            }
        );
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Retrieve finished output and submit `input`, without blocking.
    ///
    /// `None` only polls for output. Inputs addressed to another mode are ignored.
    /// A stopped processor still hands out finished output but accepts no input.
    pub fn update(&self, input: Option<&ProcessorInput>) -> UpdateReturn {
        let mut ret = UpdateReturn::default();
        let new_input = match input {
            None => None,
            Some(input) if input.mode() != B::MODE.id() => return ret,
            Some(input) => match input.payload::<B::Input>() {
                Some(payload) => Some(payload),
                None => {
                    log::warn!(
                        "processor {}: dropping input with mismatched payload type",
                        self.name()
                    );
                    return ret;
                }
            },
        };

        let running = self.is_running();
        let synchronous = self.shared.synchronous.load(Ordering::SeqCst);
        let pulls_inline = synchronous && self.has_async_input();

        {
            let Some(mut slot) = self.shared.slot.try_lock() else {
                ret.still_processing_prev_input = true;
                return ret;
            };

            // A worker stopped before it took the last input leaves it pending; without a
            // worker it is drained here.
            if running && synchronous {
                self.shared.process_pending(&mut slot);
            }

            if slot.input.is_some() && slot.processing_done {
                ret.output = slot.output.take().map(ProcessorOutput::new::<B>);
                slot.input = None;
                slot.input_ready = false;
            }

            if !running || (new_input.is_none() && !pulls_inline) {
                return ret;
            }
            if let Some(payload) = new_input {
                if slot.input.is_some() {
                    ret.still_processing_prev_input = true;
                    return ret;
                }
                slot.input = Some(payload);
                slot.input_ready = true;
                slot.processing_done = false;
            }
        }

        self.shared.input_cv.notify_one();
        ret.notified_of_input = true;
        if synchronous {
            self.shared.run_iteration();
        }
        ret
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn is_running_synchronously(&self) -> bool {
        self.shared.synchronous.load(Ordering::SeqCst)
    }

    /// Block until the worker is ready to accept input.
    pub fn wait_for_start(&self) {
        poll_until(None, || self.is_started());
    }

    /// Like `wait_for_start`, giving up after `timeout`. Returns whether it started.
    pub fn wait_for_start_timeout(&self, timeout: Duration) -> bool {
        poll_until(Some(timeout), || self.is_started())
    }

    /// Block until the last submitted input has been processed.
    pub fn wait_until_done(&self) {
        poll_until(None, || self.is_done());
    }

    /// Like `wait_until_done`, giving up after `timeout`. Returns whether it finished.
    pub fn wait_until_done_timeout(&self, timeout: Duration) -> bool {
        poll_until(Some(timeout), || self.is_done())
    }

    fn is_started(&self) -> bool {
        if self.is_running_synchronously() {
            return self.is_running();
        }
        self.shared.thread_started.load(Ordering::SeqCst)
    }

    fn is_done(&self) -> bool {
        self.shared
            .slot
            .try_lock()
            .map(|slot| slot.processing_done)
            .unwrap_or(false)
    }
}

impl<B: ProcessorBackend> Drop for Processor<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<B: ProcessorBackend> ProcessorBase for Processor<B> {
    fn mode(&self) -> u32 {
        B::MODE.id()
    }

    fn name(&self) -> &'static str {
        Processor::name(self)
    }

    fn has_async_input(&self) -> bool {
        Processor::has_async_input(self)
    }

    fn start(&self) -> Result<()> {
        Processor::start(self)
    }

    fn stop(&self) {
        Processor::stop(self)
    }

    fn set_is_synchronous(&self, synchronous: bool) -> Result<()> {
        Processor::set_is_synchronous(self, synchronous)
    }

    fn update(&self, input: Option<&ProcessorInput>) -> UpdateReturn {
        Processor::update(self, input)
    }

    fn is_running(&self) -> bool {
        Processor::is_running(self)
    }

    fn is_running_synchronously(&self) -> bool {
        Processor::is_running_synchronously(self)
    }

    fn wait_for_start(&self) {
        Processor::wait_for_start(self)
    }

    fn wait_until_done(&self) {
        Processor::wait_until_done(self)
    }
}

fn poll_until(timeout: Option<Duration>, mut condition: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if timeout.is_some_and(|limit| started.elapsed() >= limit) {
            return false;
        }
        thread::sleep(WAIT_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Mode {
        Square,
    }

    impl ModeClass for Mode {
        fn id(self) -> u32 {
            self as u32
        }
    }

    #[derive(Default)]
    struct SquareBackend {
        calls: AtomicUsize,
    }

    impl ProcessorBackend for SquareBackend {
        type Mode = Mode;
        type Input = i64;
        type Output = i64;
        const MODE: Mode = Mode::Square;

        fn name(&self) -> &'static str {
            "square"
        }

        fn process(&self, input: &i64) -> i64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            input * input
        }
    }

    #[test]
    fn stop_without_start_is_a_no_op() {
        let processor = Processor::new(SquareBackend::default());
        processor.stop();
        processor.stop();
        assert!(!processor.is_running());
    }

    #[test]
    fn stopped_processor_accepts_nothing() {
        let processor = Processor::new(SquareBackend::default());
        let ret = processor.update(Some(&ProcessorInput::new::<SquareBackend>(3)));
        assert!(!ret.notified_of_input);
        assert!(!ret.has_output());
        assert_eq!(processor.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn synchronous_start_spawns_no_thread() {
        let processor = Processor::new(SquareBackend::default());
        processor.set_is_synchronous(true).unwrap();
        processor.start().unwrap();
        assert!(processor.worker.lock().is_none());
        assert!(processor.wait_for_start_timeout(Duration::from_millis(50)));

        let ret = processor.update(Some(&ProcessorInput::new::<SquareBackend>(7)));
        assert!(ret.notified_of_input);
        let ret = processor.update(None);
        let output = ret.output.unwrap().downcast::<SquareBackend>().unwrap();
        assert_eq!(*output, 49);
    }

    #[test]
    fn synchronous_update_drains_input_left_by_stopped_worker() {
        let processor = Processor::new(SquareBackend::default());
        {
            // Input accepted by a worker that was stopped before taking it.
            let mut slot = processor.shared.slot.lock();
            slot.input = Some(Arc::new(5));
            slot.input_ready = true;
            slot.processing_done = false;
        }
        processor.set_is_synchronous(true).unwrap();
        processor.start().unwrap();

        let ret = processor.update(Some(&ProcessorInput::new::<SquareBackend>(2)));
        assert!(!ret.still_processing_prev_input);
        assert!(ret.notified_of_input);
        assert_eq!(*ret.output.unwrap().downcast::<SquareBackend>().unwrap(), 25);

        let ret = processor.update(None);
        assert_eq!(*ret.output.unwrap().downcast::<SquareBackend>().unwrap(), 4);
        assert_eq!(processor.backend().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn threaded_round_trip() {
        let processor = Processor::new(SquareBackend::default());
        processor.start().unwrap();
        assert!(processor.wait_for_start_timeout(Duration::from_secs(5)));

        let ret = processor.update(Some(&ProcessorInput::new::<SquareBackend>(-4)));
        assert!(ret.notified_of_input);
        assert!(processor.wait_until_done_timeout(Duration::from_secs(5)));

        let ret = processor.update(None);
        assert_eq!(*ret.output.unwrap().downcast::<SquareBackend>().unwrap(), 16);
        processor.stop();
        assert!(!processor.is_running());
    }
}
