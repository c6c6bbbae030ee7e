use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::VisionMode;
use crate::frame::{ImageId, ImageRgb};
use crate::processor::ProcessorBackend;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameDigest {
    pub image_id: ImageId,
    pub rows: u32,
    pub cols: u32,
    /// Hex-encoded SHA-256 over the dimensions and RGB bytes.
    pub sha256: String,
}

/// Fingerprints an RGB view. Identical pixels and dimensions give identical digests.
#[derive(Default)]
pub struct FrameDigestBackend;

impl FrameDigestBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessorBackend for FrameDigestBackend {
    type Mode = VisionMode;
    type Input = Arc<ImageRgb>;
    type Output = FrameDigest;

    const MODE: VisionMode = VisionMode::FrameDigest;

    fn name(&self) -> &'static str {
        "frame_digest"
    }

    fn process(&self, input: &Arc<ImageRgb>) -> FrameDigest {
        let mut hasher = Sha256::new();
        hasher.update(input.num_rows().to_le_bytes());
        hasher.update(input.num_cols().to_le_bytes());
        hasher.update(input.as_raw());
        FrameDigest {
            image_id: input.id(),
            rows: input.num_rows(),
            cols: input.num_cols(),
            sha256: hex::encode(hasher.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Image;

    fn view(id: u64, cols: u32, rows: u32, fill: u8) -> Arc<ImageRgb> {
        let len = (cols * rows * 3) as usize;
        let pixels = image::RgbImage::from_raw(cols, rows, vec![fill; len]).unwrap();
        Arc::new(Image::new(ImageId(id), 0, pixels))
    }

    #[test]
    fn digest_depends_on_pixels_and_shape() {
        let backend = FrameDigestBackend::new();
        let a = backend.process(&view(1, 4, 2, 7));
        let b = backend.process(&view(2, 4, 2, 7));
        let c = backend.process(&view(3, 2, 4, 7));
        let d = backend.process(&view(4, 4, 2, 8));

        assert_eq!(a.sha256.len(), 64);
        assert_eq!(a.sha256, b.sha256);
        assert_ne!(a.sha256, c.sha256);
        assert_ne!(a.sha256, d.sha256);
        assert_eq!(b.image_id, ImageId(2));
    }
}
