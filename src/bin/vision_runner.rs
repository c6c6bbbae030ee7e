//! vision_runner - drives the built-in processors over a synthetic camera
//!
//! This binary:
//! 1. Starts a camera feed that resets the image cache provider for every frame
//! 2. Registers the brightness, digest and live histogram processors with a runner
//! 3. Each tick, hands the newest gray/RGB views to the runner and logs what came back
//! 4. On Ctrl-C or after `--frames` ticks, stops everything and releases cached frames

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;

use vision_runtime::backends::{
    FrameDigestBackend, LiveHistogramBackend, MeanBrightnessBackend, VisionMode,
};
use vision_runtime::{
    CameraFeed, CollectedOutputs, ImageCacheProvider, ImageCacheSize, ImageProcessorRunner,
    Processor, ProcessorInput, RunnerInput, RuntimeConfig, SyntheticCamera,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Stop after this many ticks (runs until Ctrl-C when omitted).
    #[arg(long)]
    frames: Option<u64>,
    /// Run every processor on the main thread.
    #[arg(long)]
    synchronous: bool,
    /// JSON config file (overrides VISION_RUNTIME_CONFIG).
    #[arg(long, env = "VISION_RUNTIME_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = RuntimeConfig::load_from(args.config.as_deref())?;
    if args.synchronous {
        cfg.runner.synchronous = true;
    }
    log::info!(
        "vision_runner {}: camera {}x{} {:?} at {} fps, tick {:?}, synchronous={}",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.width,
        cfg.camera.height,
        cfg.camera.encoding,
        cfg.camera.fps,
        cfg.runner.tick,
        cfg.runner.synchronous
    );

    let provider = Arc::new(ImageCacheProvider::with_warn_threshold(
        cfg.cache.warn_num_caches,
    ));
    let camera = SyntheticCamera::new(cfg.camera.clone())?;
    let feed = CameraFeed::start(camera, provider.clone())?;

    let mut runner = ImageProcessorRunner::new();
    runner.add_processor(Arc::new(Processor::new(MeanBrightnessBackend::new())))?;
    runner.add_processor(Arc::new(Processor::new(FrameDigestBackend::new())))?;
    runner.add_processor(Arc::new(Processor::new(LiveHistogramBackend::from_feed(
        &feed,
        ImageCacheSize::QuarterLinear,
    ))))?;
    runner.set_is_synchronous(cfg.runner.synchronous)?;
    runner.start()?;

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut outputs = CollectedOutputs::new();
    let mut ticks = 0u64;
    loop {
        if args.frames.is_some_and(|limit| ticks >= limit) {
            break;
        }
        match rx.recv_timeout(cfg.runner.tick) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                log::info!("shutdown signal received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        ticks += 1;

        let mut input = RunnerInput::new();
        if let Some((gray, _)) = provider.get_gray(ImageCacheSize::HalfLinear) {
            input.push(ProcessorInput::new::<MeanBrightnessBackend>(gray));
        }
        if let Some((rgb, _)) = provider.get_rgb(ImageCacheSize::QuarterNearest) {
            input.push(ProcessorInput::new::<FrameDigestBackend>(rgb));
        }

        outputs.clear();
        runner.update(&input, &mut outputs);
        drop(input);

        if let Some(report) = outputs.get::<MeanBrightnessBackend>() {
            log::info!(
                "{}: mean={:.1} min={} max={}",
                report.image_id,
                report.mean,
                report.min,
                report.max
            );
        }
        if let Some(digest) = outputs.get::<FrameDigestBackend>() {
            log::info!(
                "{}: {}x{} sha256={}",
                digest.image_id,
                digest.cols,
                digest.rows,
                digest.sha256
            );
        }
        if let Some(histogram) = outputs.get::<LiveHistogramBackend>() {
            log::info!(
                "{}: histogram mean={:.1} bins={:?}",
                histogram.image_id,
                histogram.mean,
                histogram.bins
            );
        }
        let sets = outputs.sets();
        log::debug!(
            "tick {}: notified={:?} still_processing={:?}",
            ticks,
            mode_labels(&sets.notified),
            mode_labels(&sets.still_processing)
        );
    }

    runner.stop();
    feed.stop();
    outputs.clear();
    let released = provider.clean_caches();
    let stats = feed.stats();
    log::info!(
        "vision_runner stopped after {} ticks: {} frames published, {} caches cleaned, \
         {} released at exit, {} still held",
        ticks,
        stats.frames_published,
        stats.caches_cleaned,
        released.len(),
        provider.num_caches()
    );
    Ok(())
}

fn mode_labels<'a>(modes: impl IntoIterator<Item = &'a u32>) -> Vec<&'static str> {
    modes
        .into_iter()
        .map(|id| VisionMode::from_id(*id).map_or("unknown", VisionMode::label))
        .collect()
}
