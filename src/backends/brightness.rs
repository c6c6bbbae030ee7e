use std::sync::Arc;

use super::VisionMode;
use crate::frame::{ImageGray, ImageId};
use crate::processor::ProcessorBackend;

/// Brightness statistics for one gray view.
#[derive(Clone, Debug, PartialEq)]
pub struct BrightnessReport {
    pub image_id: ImageId,
    pub mean: f32,
    pub min: u8,
    pub max: u8,
}

/// Computes mean/min/max intensity of the gray view it is handed.
#[derive(Default)]
pub struct MeanBrightnessBackend;

impl MeanBrightnessBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorBackend for MeanBrightnessBackend {
    type Mode = VisionMode;
    type Input = Arc<ImageGray>;
    type Output = BrightnessReport;

    const MODE: VisionMode = VisionMode::MeanBrightness;

    fn name(&self) -> &'static str {
        "mean_brightness"
    }

    fn process(&self, input: &Arc<ImageGray>) -> BrightnessReport {
        let pixels = input.as_raw();
        let (mut min, mut max, mut sum) = (u8::MAX, u8::MIN, 0u64);
        for &p in pixels {
            min = min.min(p);
            max = max.max(p);
            sum += p as u64;
        }
        let mean = if pixels.is_empty() {
            min = 0;
            0.0
        } else {
            sum as f32 / pixels.len() as f32
        };
        BrightnessReport {
            image_id: input.id(),
            mean,
            min,
            max,
        }
    }
}
