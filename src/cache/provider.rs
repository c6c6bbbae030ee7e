//! Multi-reader, single-writer collection of per-frame image caches.
//!
//! The camera thread is the only writer: `reset` appends a fresh `ImageCache` for every
//! captured buffer. Readers always see the newest cache. A cache is reclaimed only once
//! none of its views are held outside the cache, and the ids of reclaimed caches are
//! handed back so the caller can release the underlying capture buffers.
//!
//! The lock is `parking_lot::RwLock`, which is task-fair: a waiting writer blocks new
//! readers from entering, and readers never upgrade to writers.

use parking_lot::RwLock;
use std::sync::Arc;

use super::image_cache::ImageCache;
use super::size::{GetType, ImageCacheSize};
use crate::frame::{ImageBuffer, ImageGray, ImageId, ImageRgb};

pub const DEFAULT_WARN_NUM_CACHES: usize = 8;

pub struct ImageCacheProvider {
    caches: RwLock<Vec<ImageCache>>,
    warn_num_caches: usize,
}

impl ImageCacheProvider {
    pub fn new() -> Self {
        Self::with_warn_threshold(DEFAULT_WARN_NUM_CACHES)
    }

    /// Log a warning whenever more than `warn_num_caches` caches are retained.
    pub fn with_warn_threshold(warn_num_caches: usize) -> Self {
        Self {
            caches: RwLock::new(Vec::new()),
            warn_num_caches,
        }
    }

    /// Reclaim unused caches, then append a new cache for `buffer`.
    ///
    /// Returns the ids of the reclaimed caches.
    pub fn reset(&self, buffer: ImageBuffer) -> Vec<ImageId> {
        let mut caches = self.caches.write();
        let cleaned = clean_locked(&mut caches);
        log::debug!(
            "image cache provider: reset with {}, cleaned {:?}",
            buffer.id(),
            cleaned
        );
        caches.push(ImageCache::new(buffer));
        if caches.len() > self.warn_num_caches {
            log::warn!(
                "image cache provider retaining {} caches; views are being held too long",
                caches.len()
            );
        }
        cleaned
    }

    /// Reclaim every cache whose views are no longer held. Returns their ids.
    pub fn clean_caches(&self) -> Vec<ImageId> {
        let mut caches = self.caches.write();
        clean_locked(&mut caches)
    }

    /// Gray view of the newest frame, or `None` when no frame has been provided.
    pub fn get_gray(&self, size: ImageCacheSize) -> Option<(Arc<ImageGray>, GetType)> {
        self.with_latest(|cache| cache.get_gray(size))
    }

    /// RGB view of the newest frame, or `None` when no frame has been provided.
    pub fn get_rgb(&self, size: ImageCacheSize) -> Option<(Arc<ImageRgb>, GetType)> {
        self.with_latest(|cache| cache.get_rgb(size))
    }

    /// Run `f` against the newest cache while holding the read lock.
    pub fn with_latest<R>(&self, f: impl FnOnce(&ImageCache) -> R) -> Option<R> {
        let caches = self.caches.read();
        caches.last().map(f)
    }

    pub fn latest_image_id(&self) -> Option<ImageId> {
        self.with_latest(|cache| cache.image_id())
    }

    pub fn latest_timestamp_ms(&self) -> Option<u64> {
        self.with_latest(|cache| cache.timestamp_ms())
    }

    pub fn has_color(&self) -> bool {
        self.with_latest(|cache| cache.has_color()).unwrap_or(false)
    }

    pub fn num_caches(&self) -> usize {
        self.caches.read().len()
    }
}

impl Default for ImageCacheProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn clean_locked(caches: &mut Vec<ImageCache>) -> Vec<ImageId> {
    let mut cleaned = Vec::new();
    caches.retain(|cache| {
        if cache.are_entries_in_use() {
            true
        } else {
            cleaned.push(cache.image_id());
            false
        }
    });
    cleaned
}
