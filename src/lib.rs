//! Vision runtime
//!
//! Threaded image-processing runtime for camera pipelines.
//!
//! # Architecture
//!
//! - A camera thread owns an `ImageCacheProvider` and resets it for every captured frame.
//! - Processing steps are `ProcessorBackend`s wrapped in a `Processor`, a single-slot
//!   worker that never blocks its caller: `update` hands over the next input and
//!   collects the previous output when ready.
//! - An `ImageProcessorRunner` drives a set of processors once per tick, routing
//!   inputs by mode and aggregating outputs into a `RunnerOutput`.
//!
//! Decoded and resized views of a frame are computed lazily, at most once, by the
//! frame's `ImageCache`. A frame's cache is reclaimed only after every view handed out
//! from it has been dropped, so a slow processor delays reclamation instead of reading
//! freed data.
//!
//! # Module Structure
//!
//! - `frame`: raw source buffers (`ImageBuffer`) and derived views (`Image<P>`)
//! - `cache`: per-frame view cache and the multi-reader provider
//! - `processor`: backend trait, mode routing keys, and the worker state machine
//! - `runner`: multi-processor routing and output aggregation
//! - `ingest`: synthetic camera and the camera feed thread
//! - `backends`: built-in processors
//! - `config`: runtime configuration (JSON file plus `VISION_*` environment overrides)

pub mod backends;
pub mod cache;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod processor;
pub mod runner;

pub use cache::{
    GetType, ImageCache, ImageCacheProvider, ImageCacheSize, ResizeMethod,
    DEFAULT_WARN_NUM_CACHES,
};
pub use config::RuntimeConfig;
pub use frame::{Image, ImageBuffer, ImageEncoding, ImageGray, ImageId, ImageRgb};
pub use ingest::{CameraConfig, CameraFeed, FrameSignal, FrameSubscription, SyntheticCamera};
pub use processor::{
    ModeClass, Processor, ProcessorBackend, ProcessorBase, ProcessorInput, ProcessorOutput,
    UpdateReturn,
};
pub use runner::{CollectedOutputs, ImageProcessorRunner, ProcessorSets, RunnerInput, RunnerOutput};
