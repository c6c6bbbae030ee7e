//! Per-frame cache of size and channel converted views of one source buffer.
//!
//! Every view is computed at most once. Concurrent first requests for the same view
//! block on a per-entry once cell, so only one caller performs the conversion and the
//! others receive the shared result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use image::Pixel;

use super::convert;
use super::size::{GetType, ImageCacheSize};
use crate::frame::{Image, ImageBuffer, ImageGray, ImageId, ImageRgb};

type Slot<P> = Arc<OnceLock<Arc<Image<P>>>>;
type SlotMap<P> = Mutex<HashMap<ImageCacheSize, Slot<P>>>;

pub struct ImageCache {
    buffer: ImageBuffer,
    gray: SlotMap<image::Luma<u8>>,
    rgb: SlotMap<image::Rgb<u8>>,
}

impl ImageCache {
    pub fn new(buffer: ImageBuffer) -> Self {
        Self {
            buffer,
            gray: Mutex::new(HashMap::new()),
            rgb: Mutex::new(HashMap::new()),
        }
    }

    /// Adopt a new source buffer, dropping every cached view.
    pub fn reset(&mut self, buffer: ImageBuffer) {
        self.buffer = buffer;
        self.gray.get_mut().clear();
        self.rgb.get_mut().clear();
    }

    pub fn buffer(&self) -> &ImageBuffer {
        &self.buffer
    }

    pub fn image_id(&self) -> ImageId {
        self.buffer.id()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.buffer.timestamp_ms()
    }

    pub fn has_color(&self) -> bool {
        self.buffer.has_color()
    }

    /// Rows of the full-size decoded image.
    pub fn orig_num_rows(&self) -> u32 {
        self.buffer.decoded_dims().0
    }

    /// Columns of the full-size decoded image.
    pub fn orig_num_cols(&self) -> u32 {
        self.buffer.decoded_dims().1
    }

    pub fn get_gray(&self, size: ImageCacheSize) -> (Arc<ImageGray>, GetType) {
        lookup(&self.gray, size, || self.compute_gray(size))
    }

    pub fn get_rgb(&self, size: ImageCacheSize) -> (Arc<ImageRgb>, GetType) {
        lookup(&self.rgb, size, || self.compute_rgb(size))
    }

    /// True while any cached view is also held outside the cache.
    pub fn are_entries_in_use(&self) -> bool {
        any_held(&self.gray) || any_held(&self.rgb)
    }

    /// Drop the cache's own references. Outside holders keep their views alive.
    pub fn release_memory(&self) {
        self.gray.lock().clear();
        self.rgb.lock().clear();
    }

    /// Number of computed views.
    pub fn num_entries(&self) -> usize {
        ready(&self.gray).len() + ready(&self.rgb).len()
    }

    fn compute_gray(&self, size: ImageCacheSize) -> (ImageGray, GetType) {
        let (rows, cols) = size.dims(self.orig_num_rows(), self.orig_num_cols());
        let method = size.method();

        // Same-size color data converts without any resampling.
        let rgb_entries = ready(&self.rgb);
        if let Some((_, rgb)) = rgb_entries.iter().find(|(s, _)| *s == size) {
            let gray = convert::rgb_to_gray(rgb.pixels());
            return (self.wrap(gray), GetType::ResizeIntoExisting);
        }
        if let Some(gray) = best_larger(&ready(&self.gray), size) {
            let resized = convert::resize(gray.pixels(), rows, cols, method);
            return (self.wrap(resized), GetType::ResizeIntoExisting);
        }
        if let Some(rgb) = best_larger(&rgb_entries, size) {
            let resized = convert::resize(rgb.pixels(), rows, cols, method);
            return (
                self.wrap(convert::rgb_to_gray(&resized)),
                GetType::ResizeIntoExisting,
            );
        }

        let full = convert::decode_gray(&self.buffer);
        let resized = convert::resize(&full, rows, cols, method);
        (self.wrap(resized), GetType::NewEntry)
    }

    fn compute_rgb(&self, size: ImageCacheSize) -> (ImageRgb, GetType) {
        let (rows, cols) = size.dims(self.orig_num_rows(), self.orig_num_cols());
        let method = size.method();

        if let Some(rgb) = best_larger(&ready(&self.rgb), size) {
            let resized = convert::resize(rgb.pixels(), rows, cols, method);
            return (self.wrap(resized), GetType::ResizeIntoExisting);
        }
        // Gray entries only carry the full information when the source has no color.
        if !self.has_color() {
            let gray_entries = ready(&self.gray);
            let same = gray_entries
                .iter()
                .find(|(s, _)| *s == size)
                .map(|(_, img)| img.clone());
            if let Some(gray) = same.or_else(|| best_larger(&gray_entries, size)) {
                let resized = convert::resize(gray.pixels(), rows, cols, method);
                return (
                    self.wrap(convert::gray_to_rgb(&resized)),
                    GetType::ResizeIntoExisting,
                );
            }
        }

        let full = convert::decode_rgb(&self.buffer);
        let resized = convert::resize(&full, rows, cols, method);
        (self.wrap(resized), GetType::NewEntry)
    }

    fn wrap<P: Pixel<Subpixel = u8>>(&self, pixels: image::ImageBuffer<P, Vec<u8>>) -> Image<P> {
        Image::new(self.buffer.id(), self.buffer.timestamp_ms(), pixels)
    }
}

fn lookup<P, F>(map: &SlotMap<P>, size: ImageCacheSize, compute: F) -> (Arc<Image<P>>, GetType)
where
    P: Pixel<Subpixel = u8>,
    F: FnOnce() -> (Image<P>, GetType),
{
    let slot = map.lock().entry(size).or_default().clone();
    let mut get_type = GetType::FullyCached;
    let image = slot
        .get_or_init(|| {
            let (image, computed) = compute();
            get_type = computed;
            Arc::new(image)
        })
        .clone();
    (image, get_type)
}

/// Snapshot of the views that finished computing.
fn ready<P: Pixel<Subpixel = u8>>(map: &SlotMap<P>) -> Vec<(ImageCacheSize, Arc<Image<P>>)> {
    map.lock()
        .iter()
        .filter_map(|(size, slot)| slot.get().map(|img| (*size, img.clone())))
        .collect()
}

/// Smallest view strictly larger than `target`.
fn best_larger<P: Pixel<Subpixel = u8>>(
    entries: &[(ImageCacheSize, Arc<Image<P>>)],
    target: ImageCacheSize,
) -> Option<Arc<Image<P>>> {
    entries
        .iter()
        .filter(|(size, _)| size.scale_divisor() < target.scale_divisor())
        .max_by_key(|(size, _)| size.scale_divisor())
        .map(|(_, img)| img.clone())
}

fn any_held<P: Pixel<Subpixel = u8>>(map: &SlotMap<P>) -> bool {
    map.lock()
        .values()
        .filter_map(|slot| slot.get())
        .any(|img| Arc::strong_count(img) > 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ImageEncoding;
    use std::sync::Barrier;
    use std::thread;

    fn bayer_buffer(id: u64, rows: u32, cols: u32) -> ImageBuffer {
        let data = (0..rows * cols).map(|i| (i % 251) as u8).collect();
        ImageBuffer::new(ImageId(id), 1000 + id, ImageEncoding::BayerRggb8, rows, cols, data)
            .unwrap()
    }

    fn gray_buffer(id: u64, rows: u32, cols: u32) -> ImageBuffer {
        let data = (0..rows * cols).map(|i| (i % 13) as u8).collect();
        ImageBuffer::new(ImageId(id), 0, ImageEncoding::Gray8, rows, cols, data).unwrap()
    }

    #[test]
    fn second_lookup_is_fully_cached() {
        let cache = ImageCache::new(bayer_buffer(1, 16, 16));
        let (first, t1) = cache.get_gray(ImageCacheSize::Full);
        let (second, t2) = cache.get_gray(ImageCacheSize::Full);
        assert_eq!(t1, GetType::NewEntry);
        assert_eq!(t2, GetType::FullyCached);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!((first.num_rows(), first.num_cols()), (8, 8));
        assert_eq!(first.id(), ImageId(1));
    }

    #[test]
    fn smaller_view_reuses_existing_entry() {
        let cache = ImageCache::new(bayer_buffer(2, 32, 32));
        cache.get_gray(ImageCacheSize::Full);
        let (half, get_type) = cache.get_gray(ImageCacheSize::HalfLinear);
        assert_eq!(get_type, GetType::ResizeIntoExisting);
        assert_eq!((half.num_rows(), half.num_cols()), (8, 8));
    }

    #[test]
    fn gray_converts_from_same_size_rgb() {
        let cache = ImageCache::new(bayer_buffer(3, 16, 16));
        let (rgb, _) = cache.get_rgb(ImageCacheSize::HalfNearest);
        let (gray, get_type) = cache.get_gray(ImageCacheSize::HalfNearest);
        assert_eq!(get_type, GetType::ResizeIntoExisting);
        assert_eq!(gray.pixels().dimensions(), rgb.pixels().dimensions());
    }

    #[test]
    fn color_never_derived_from_gray_of_color_source() {
        let cache = ImageCache::new(bayer_buffer(4, 16, 16));
        cache.get_gray(ImageCacheSize::Full);
        let (rgb, get_type) = cache.get_rgb(ImageCacheSize::Full);
        assert_eq!(get_type, GetType::NewEntry);
        let direct = convert::decode_rgb(cache.buffer());
        assert_eq!(rgb.pixels(), &direct);
    }

    #[test]
    fn gray_source_builds_rgb_from_gray_entry() {
        let cache = ImageCache::new(gray_buffer(5, 8, 8));
        cache.get_gray(ImageCacheSize::Full);
        let (rgb, get_type) = cache.get_rgb(ImageCacheSize::HalfNearest);
        assert_eq!(get_type, GetType::ResizeIntoExisting);
        assert_eq!(rgb.pixels().dimensions(), (4, 4));
    }

    #[test]
    fn in_use_tracks_outside_holders() {
        let cache = ImageCache::new(bayer_buffer(6, 8, 8));
        assert!(!cache.are_entries_in_use());
        let (held, _) = cache.get_gray(ImageCacheSize::Full);
        assert!(cache.are_entries_in_use());
        drop(held);
        assert!(!cache.are_entries_in_use());
        assert_eq!(cache.num_entries(), 1);
    }

    #[test]
    fn release_memory_keeps_outside_views_alive() {
        let cache = ImageCache::new(bayer_buffer(7, 8, 8));
        let (held, _) = cache.get_rgb(ImageCacheSize::Full);
        cache.release_memory();
        assert_eq!(cache.num_entries(), 0);
        assert!(!cache.are_entries_in_use());
        assert_eq!(held.num_rows(), 4);
        let (_, get_type) = cache.get_rgb(ImageCacheSize::Full);
        assert_eq!(get_type, GetType::NewEntry);
    }

    #[test]
    fn reset_discards_entries() {
        let mut cache = ImageCache::new(bayer_buffer(8, 8, 8));
        cache.get_gray(ImageCacheSize::Full);
        cache.reset(bayer_buffer(9, 8, 8));
        assert_eq!(cache.num_entries(), 0);
        let (gray, get_type) = cache.get_gray(ImageCacheSize::Full);
        assert_eq!(get_type, GetType::NewEntry);
        assert_eq!(gray.id(), ImageId(9));
    }

    #[test]
    fn parallel_reads_compute_once() {
        let cache = Arc::new(ImageCache::new(bayer_buffer(10, 480, 640)));
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let (img, get_type) = cache.get_gray(ImageCacheSize::QuarterLinear);
                    (img, get_type)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let new_entries = results
            .iter()
            .filter(|(_, t)| *t == GetType::NewEntry)
            .count();
        let cached = results
            .iter()
            .filter(|(_, t)| *t == GetType::FullyCached)
            .count();
        assert_eq!(new_entries, 1);
        assert_eq!(cached, 1);
        assert_eq!(results[0].0.id(), results[1].0.id());
        assert!(Arc::ptr_eq(&results[0].0, &results[1].0));
    }

    #[test]
    fn rgb_after_gray_from_other_thread_matches_direct_decode() {
        let cache = Arc::new(ImageCache::new(bayer_buffer(11, 64, 64)));
        let reader = cache.clone();
        thread::spawn(move || {
            reader.get_gray(ImageCacheSize::HalfLinear);
        })
        .join()
        .unwrap();

        let (rgb, get_type) = cache.get_rgb(ImageCacheSize::HalfLinear);
        assert!(matches!(
            get_type,
            GetType::NewEntry | GetType::ResizeIntoExisting
        ));
        let full = convert::decode_rgb(cache.buffer());
        let expected = convert::resize(&full, 16, 16, ImageCacheSize::HalfLinear.method());
        assert_eq!(rgb.pixels(), &expected);
    }
}
