//! Intensity histogram over frames the backend pulls from a camera feed.

use std::sync::Arc;

use super::VisionMode;
use crate::cache::{ImageCacheProvider, ImageCacheSize};
use crate::frame::{ImageGray, ImageId};
use crate::ingest::{CameraFeed, FrameSubscription};
use crate::processor::ProcessorBackend;

pub const HISTOGRAM_BINS: usize = 16;

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramReport {
    pub image_id: ImageId,
    pub bins: [u32; HISTOGRAM_BINS],
    pub mean: f32,
}

/// Histogram backend with its own input: it waits for each newly published frame and
/// reads the gray view of it from the provider.
pub struct LiveHistogramBackend {
    subscription: FrameSubscription,
    provider: Arc<ImageCacheProvider>,
    size: ImageCacheSize,
}

impl LiveHistogramBackend {
    pub fn new(
        subscription: FrameSubscription,
        provider: Arc<ImageCacheProvider>,
        size: ImageCacheSize,
    ) -> Self {
        Self {
            subscription,
            provider,
            size,
        }
    }

    pub fn from_feed(feed: &CameraFeed, size: ImageCacheSize) -> Self {
        Self::new(feed.subscribe(), feed.provider().clone(), size)
    }
}

impl ProcessorBackend for LiveHistogramBackend {
    type Mode = VisionMode;
    type Input = Arc<ImageGray>;
    type Output = HistogramReport;

    const MODE: VisionMode = VisionMode::LiveHistogram;

    fn name(&self) -> &'static str {
        "live_histogram"
    }

    fn process(&self, input: &Arc<ImageGray>) -> HistogramReport {
        let pixels = input.as_raw();
        let mut bins = [0u32; HISTOGRAM_BINS];
        let mut sum = 0u64;
        for &p in pixels {
            bins[p as usize * HISTOGRAM_BINS / 256] += 1;
            sum += p as u64;
        }
        let mean = if pixels.is_empty() {
            0.0
        } else {
            sum as f32 / pixels.len() as f32
        };
        HistogramReport {
            image_id: input.id(),
            bins,
            mean,
        }
    }

    fn has_async_input(&self) -> bool {
        true
    }

    fn async_acquire_input(&self) -> Option<Arc<ImageGray>> {
        loop {
            self.subscription.wait_for_frame()?;
            if let Some((gray, _)) = self.provider.get_gray(self.size) {
                return Some(gray);
            }
        }
    }

    fn async_wake(&self) {
        self.subscription.wake();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Image, ImageBuffer, ImageEncoding};
    use crate::ingest::FrameSignal;

    #[test]
    fn bins_cover_full_range() {
        let signal = FrameSignal::new();
        let backend = LiveHistogramBackend::new(
            signal.subscribe(),
            Arc::new(ImageCacheProvider::new()),
            ImageCacheSize::Full,
        );
        let pixels = image::GrayImage::from_raw(4, 1, vec![0, 15, 16, 255]).unwrap();
        let report = backend.process(&Arc::new(Image::new(ImageId(1), 0, pixels)));
        assert_eq!(report.bins[0], 2);
        assert_eq!(report.bins[1], 1);
        assert_eq!(report.bins[HISTOGRAM_BINS - 1], 1);
        assert_eq!(report.bins.iter().sum::<u32>(), 4);
    }

    #[test]
    fn acquires_published_frame_and_wakes_on_request() {
        let signal = FrameSignal::new();
        let provider = Arc::new(ImageCacheProvider::new());
        let backend = LiveHistogramBackend::new(
            signal.subscribe(),
            provider.clone(),
            ImageCacheSize::HalfNearest,
        );

        let buffer =
            ImageBuffer::new(ImageId(5), 0, ImageEncoding::Gray8, 4, 4, vec![128; 16]).unwrap();
        provider.reset(buffer);
        signal.publish();

        let gray = backend.async_acquire_input().unwrap();
        assert_eq!(gray.id(), ImageId(5));
        assert_eq!((gray.num_rows(), gray.num_cols()), (2, 2));

        backend.async_wake();
        assert!(backend.async_acquire_input().is_none());
    }
}
