use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::processor::{
    ModeClass, ProcessorBackend, ProcessorInput, ProcessorOutput, UpdateReturn,
};

/// Inputs for one runner tick. Routing is by mode, so order does not matter.
#[derive(Clone, Debug, Default)]
pub struct RunnerInput {
    inputs: Vec<ProcessorInput>,
}

impl RunnerInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, input: ProcessorInput) {
        self.inputs.push(input);
    }

    /// Add an input for backend `B`.
    pub fn with<B: ProcessorBackend>(mut self, input: B::Input) -> Self {
        self.push(ProcessorInput::new::<B>(input));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProcessorInput> {
        self.inputs.iter()
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl FromIterator<ProcessorInput> for RunnerInput {
    fn from_iter<I: IntoIterator<Item = ProcessorInput>>(iter: I) -> Self {
        Self {
            inputs: iter.into_iter().collect(),
        }
    }
}

/// Modes that reported activity during runner ticks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorSets {
    pub produced_output: BTreeSet<u32>,
    pub notified: BTreeSet<u32>,
    pub still_processing: BTreeSet<u32>,
}

impl ProcessorSets {
    pub fn clear(&mut self) {
        self.produced_output.clear();
        self.notified.clear();
        self.still_processing.clear();
    }
}

/// Accumulator the runner aggregates `update` results into.
///
/// Implementors decide what to keep from each output (typically by downcasting per
/// mode); the bookkeeping of which modes were notified or busy is shared.
pub trait RunnerOutput {
    fn add_output(&mut self, output: ProcessorOutput);

    fn processor_sets(&mut self) -> &mut ProcessorSets;

    fn add_processor_to_notified_set(&mut self, mode: u32) {
        self.processor_sets().notified.insert(mode);
    }

    fn add_processor_to_still_processing_set(&mut self, mode: u32) {
        self.processor_sets().still_processing.insert(mode);
    }

    /// Fold one `update` result for processor `mode` into this accumulator.
    fn record(&mut self, mode: u32, ret: UpdateReturn) {
        if let Some(output) = ret.output {
            self.processor_sets().produced_output.insert(mode);
            self.add_output(output);
        }
        if ret.notified_of_input {
            self.add_processor_to_notified_set(mode);
        }
        if ret.still_processing_prev_input {
            self.add_processor_to_still_processing_set(mode);
        }
    }
}

/// Keeps the latest output per mode.
#[derive(Debug, Default)]
pub struct CollectedOutputs {
    outputs: HashMap<u32, ProcessorOutput>,
    sets: ProcessorSets,
}

impl CollectedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typed output of backend `B`, if one was collected.
    pub fn get<B: ProcessorBackend>(&self) -> Option<Arc<B::Output>> {
        self.outputs
            .get(&B::MODE.id())
            .and_then(|output| output.downcast::<B>())
    }

    pub fn sets(&self) -> &ProcessorSets {
        &self.sets
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Forget collected outputs and activity, ready for the next tick.
    pub fn clear(&mut self) {
        self.outputs.clear();
        self.sets.clear();
    }
}

impl RunnerOutput for CollectedOutputs {
    fn add_output(&mut self, output: ProcessorOutput) {
        self.outputs.insert(output.mode(), output);
    }

    fn processor_sets(&mut self) -> &mut ProcessorSets {
        &mut self.sets
    }
}
