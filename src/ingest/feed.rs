//! Camera thread feeding the image cache provider.
//!
//! The feed is the provider's single writer. For every captured frame it:
//! 1. Resets the provider with the new buffer
//! 2. Returns the buffers of reclaimed caches to the camera
//! 3. Publishes the frame on its `FrameSignal` so pulled-input processors wake up

use anyhow::{Context, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::synthetic::SyntheticCamera;
use crate::cache::ImageCacheProvider;

// ----------------------------------------------------------------------------
// FrameSignal: new-frame notification
// ----------------------------------------------------------------------------

/// Broadcasts a sequence number each time a frame is published.
#[derive(Default)]
pub struct FrameSignal {
    sequence: Mutex<u64>,
    cv: Condvar,
}

impl FrameSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Announce a new frame. Returns its sequence number.
    pub fn publish(&self) -> u64 {
        let mut sequence = self.sequence.lock();
        *sequence += 1;
        self.cv.notify_all();
        *sequence
    }

    pub fn sequence(&self) -> u64 {
        *self.sequence.lock()
    }

    /// Subscription that only sees frames published after this call.
    pub fn subscribe(self: &Arc<Self>) -> FrameSubscription {
        FrameSubscription {
            last_seen: AtomicU64::new(self.sequence()),
            woken: AtomicBool::new(false),
            signal: self.clone(),
        }
    }
}

/// One consumer's position in a `FrameSignal`.
pub struct FrameSubscription {
    signal: Arc<FrameSignal>,
    last_seen: AtomicU64,
    woken: AtomicBool,
}

impl FrameSubscription {
    /// Block until a frame newer than the last one seen is published.
    ///
    /// Returns `None` if `wake` was called since the previous wait. The wake is sticky,
    /// so a wake that lands before the wait starts is not lost.
    pub fn wait_for_frame(&self) -> Option<u64> {
        let mut sequence = self.signal.sequence.lock();
        loop {
            if self.woken.swap(false, Ordering::SeqCst) {
                return None;
            }
            if *sequence > self.last_seen.load(Ordering::SeqCst) {
                self.last_seen.store(*sequence, Ordering::SeqCst);
                return Some(*sequence);
            }
            self.signal.cv.wait(&mut sequence);
        }
    }

    /// Interrupt a pending or the next `wait_for_frame`.
    pub fn wake(&self) {
        self.woken.store(true, Ordering::SeqCst);
        let _sequence = self.signal.sequence.lock();
        self.signal.cv.notify_all();
    }
}

// ----------------------------------------------------------------------------
// CameraFeed
// ----------------------------------------------------------------------------

/// Statistics for a camera feed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub frames_published: u64,
    pub caches_cleaned: u64,
    pub outstanding_buffers: usize,
}

struct FeedShared {
    provider: Arc<ImageCacheProvider>,
    signal: Arc<FrameSignal>,
    stop: Mutex<bool>,
    stop_cv: Condvar,
    frames_published: AtomicU64,
    caches_cleaned: AtomicU64,
    outstanding_buffers: AtomicUsize,
}

pub struct CameraFeed {
    shared: Arc<FeedShared>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl CameraFeed {
    /// Start capturing from `camera` into `provider` at the camera's frame rate.
    pub fn start(camera: SyntheticCamera, provider: Arc<ImageCacheProvider>) -> Result<Self> {
        let shared = Arc::new(FeedShared {
            provider,
            signal: FrameSignal::new(),
            stop: Mutex::new(false),
            stop_cv: Condvar::new(),
            frames_published: AtomicU64::new(0),
            caches_cleaned: AtomicU64::new(0),
            outstanding_buffers: AtomicUsize::new(0),
        });

        let config = camera.config().clone();
        log::info!(
            "camera feed: starting {}x{} {:?} at {} fps",
            config.width,
            config.height,
            config.encoding,
            config.fps
        );

        let thread_shared = shared.clone();
        let join = thread::Builder::new()
            .name("camera-feed".to_string())
            .spawn(move || run_feed(camera, thread_shared))
            .context("spawn camera feed thread")?;

        Ok(Self {
            shared,
            join: Mutex::new(Some(join)),
        })
    }

    pub fn provider(&self) -> &Arc<ImageCacheProvider> {
        &self.shared.provider
    }

    pub fn signal(&self) -> &Arc<FrameSignal> {
        &self.shared.signal
    }

    pub fn subscribe(&self) -> FrameSubscription {
        self.shared.signal.subscribe()
    }

    pub fn stats(&self) -> FeedStats {
        FeedStats {
            frames_published: self.shared.frames_published.load(Ordering::SeqCst),
            caches_cleaned: self.shared.caches_cleaned.load(Ordering::SeqCst),
            outstanding_buffers: self.shared.outstanding_buffers.load(Ordering::SeqCst),
        }
    }

    /// Stop capturing and join the camera thread. No effect once stopped.
    pub fn stop(&self) {
        {
            let mut stop = self.shared.stop.lock();
            *stop = true;
            self.shared.stop_cv.notify_all();
        }
        if let Some(join) = self.join.lock().take() {
            if join.join().is_err() {
                log::error!("camera feed: thread panicked");
            }
            log::info!("camera feed: stopped");
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_feed(mut camera: SyntheticCamera, shared: Arc<FeedShared>) {
    let interval = Duration::from_millis(1000 / camera.config().fps.max(1) as u64);
    loop {
        let frame = match camera.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("camera feed: capture failed: {:#}", err);
                break;
            }
        };

        let cleaned = shared.provider.reset(frame);
        if !cleaned.is_empty() {
            log::trace!("camera feed: releasing buffers {:?}", cleaned);
            camera.release(&cleaned);
            shared
                .caches_cleaned
                .fetch_add(cleaned.len() as u64, Ordering::SeqCst);
        }
        shared
            .outstanding_buffers
            .store(camera.stats().outstanding_buffers, Ordering::SeqCst);
        shared.frames_published.fetch_add(1, Ordering::SeqCst);
        shared.signal.publish();

        let mut stop = shared.stop.lock();
        if !*stop {
            shared.stop_cv.wait_for(&mut stop, interval);
        }
        if *stop {
            break;
        }
    }

    // Whatever is no longer held goes back to the camera before the thread exits.
    let cleaned = shared.provider.clean_caches();
    camera.release(&cleaned);
    shared
        .caches_cleaned
        .fetch_add(cleaned.len() as u64, Ordering::SeqCst);
    shared
        .outstanding_buffers
        .store(camera.stats().outstanding_buffers, Ordering::SeqCst);
}
