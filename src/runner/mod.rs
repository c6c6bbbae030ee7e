//! Runner driving a set of processors once per tick.
//!
//! Processors are split by how they get input: pushed-input processors see every input
//! of the tick and keep the ones addressed to their mode; pulled-input processors are
//! only polled for output. A pulled-input processor that produces faster than the runner
//! ticks loses intermediate outputs; only the latest finished one is retrieved.

mod output;

pub use output::{CollectedOutputs, ProcessorSets, RunnerInput, RunnerOutput};

use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::processor::ProcessorBase;

#[derive(Default)]
pub struct ImageProcessorRunner {
    pushed_input: Vec<Arc<dyn ProcessorBase>>,
    async_input: Vec<Arc<dyn ProcessorBase>>,
}

impl ImageProcessorRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor. Mode ids must be unique within a runner.
    pub fn add_processor(&mut self, processor: Arc<dyn ProcessorBase>) -> Result<()> {
        let mode = processor.mode();
        if let Some(existing) = self.processors().find(|p| p.mode() == mode) {
            return Err(anyhow!(
                "processor '{}' reuses mode {} already registered by '{}'",
                processor.name(),
                mode,
                existing.name()
            ));
        }
        log::debug!(
            "runner: registered processor '{}' (mode {}, {} input)",
            processor.name(),
            mode,
            if processor.has_async_input() {
                "pulled"
            } else {
                "pushed"
            }
        );
        if processor.has_async_input() {
            self.async_input.push(processor);
        } else {
            self.pushed_input.push(processor);
        }
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        for processor in self.processors() {
            processor.start()?;
        }
        Ok(())
    }

    pub fn stop(&self) {
        for processor in self.processors() {
            processor.stop();
        }
    }

    pub fn set_is_synchronous(&self, synchronous: bool) -> Result<()> {
        for processor in self.processors() {
            processor.set_is_synchronous(synchronous)?;
        }
        Ok(())
    }

    /// Submit this tick's inputs and collect whatever output is ready.
    pub fn update(&self, input: &RunnerInput, output: &mut dyn RunnerOutput) {
        for processor in &self.pushed_input {
            for item in input.iter() {
                let ret = processor.update(Some(item));
                output.record(processor.mode(), ret);
            }
        }
        for processor in &self.async_input {
            let ret = processor.update(None);
            output.record(processor.mode(), ret);
        }
    }

    pub fn num_processors(&self) -> usize {
        self.pushed_input.len() + self.async_input.len()
    }

    pub fn processor_modes(&self) -> Vec<u32> {
        self.processors().map(|p| p.mode()).collect()
    }

    pub fn processors(&self) -> impl Iterator<Item = &Arc<dyn ProcessorBase>> {
        self.pushed_input.iter().chain(self.async_input.iter())
    }
}
