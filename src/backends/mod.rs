//! Built-in processor backends.
//!
//! Every backend is keyed by one `VisionMode`:
//! - `MeanBrightness`: brightness statistics of a gray view (pushed input)
//! - `FrameDigest`: SHA-256 digest of an RGB view (pushed input)
//! - `LiveHistogram`: intensity histogram, pulling frames from a camera feed itself

pub mod brightness;
pub mod digest;
pub mod histogram;

pub use brightness::{BrightnessReport, MeanBrightnessBackend};
pub use digest::{FrameDigest, FrameDigestBackend};
pub use histogram::{HistogramReport, LiveHistogramBackend, HISTOGRAM_BINS};

use crate::processor::ModeClass;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisionMode {
    MeanBrightness = 1,
    FrameDigest = 2,
    LiveHistogram = 3,
}

impl ModeClass for VisionMode {
    fn id(self) -> u32 {
        self as u32
    }
}

impl VisionMode {
    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(VisionMode::MeanBrightness),
            2 => Some(VisionMode::FrameDigest),
            3 => Some(VisionMode::LiveHistogram),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            VisionMode::MeanBrightness => "mean_brightness",
            VisionMode::FrameDigest => "frame_digest",
            VisionMode::LiveHistogram => "live_histogram",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_are_distinct() {
        let modes = [
            VisionMode::MeanBrightness,
            VisionMode::FrameDigest,
            VisionMode::LiveHistogram,
        ];
        for mode in modes {
            assert_eq!(VisionMode::from_id(mode.id()), Some(mode));
        }
        assert_eq!(VisionMode::from_id(0), None);
    }
}
