//! Synthetic camera.
//!
//! Produces test-pattern frames in any supported encoding and tracks which capture
//! buffers are still outstanding, the way a driver's buffer pool would. Buffers return
//! to the pool when the cache provider reports them cleaned.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::collections::HashSet;
use std::time::Instant;

use crate::frame::{ImageBuffer, ImageEncoding, ImageId};

/// Configuration for a camera source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraConfig {
    /// Sensor columns.
    pub width: u32,
    /// Sensor rows.
    pub height: u32,
    /// Target frame rate (frames per second).
    pub fps: u32,
    pub encoding: ImageEncoding,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            fps: 15,
            encoding: ImageEncoding::BayerRggb8,
        }
    }
}

impl CameraConfig {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("camera resolution must be non-zero"));
        }
        if self.fps == 0 {
            return Err(anyhow!("camera fps must be greater than zero"));
        }
        let odd = self.width % 2 != 0 || self.height % 2 != 0;
        if self.encoding == ImageEncoding::BayerRggb8 && odd {
            return Err(anyhow!(
                "bayer camera requires even resolution, got {}x{}",
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub outstanding_buffers: usize,
}

pub struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
    /// Simulated scene; changes every 50 frames.
    scene_state: u8,
    started: Instant,
    outstanding: HashSet<ImageId>,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            frame_count: 0,
            scene_state: 0,
            started: Instant::now(),
            outstanding: HashSet::new(),
        })
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    /// Capture the next frame. Its buffer stays outstanding until `release`d.
    pub fn next_frame(&mut self) -> Result<ImageBuffer> {
        self.frame_count += 1;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let id = ImageId(self.frame_count);
        let timestamp_ms = self.started.elapsed().as_millis() as u64;
        let pixels = self.generate_pixels();
        let buffer = ImageBuffer::new(
            id,
            timestamp_ms,
            self.config.encoding,
            self.config.height,
            self.config.width,
            pixels,
        )?;
        self.outstanding.insert(id);
        Ok(buffer)
    }

    /// Return capture buffers to the pool.
    pub fn release(&mut self, ids: &[ImageId]) {
        for id in ids {
            if !self.outstanding.remove(id) {
                log::warn!("camera: release of unknown buffer {}", id);
            }
        }
    }

    pub fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            outstanding_buffers: self.outstanding.len(),
        }
    }

    fn generate_pixels(&self) -> Vec<u8> {
        let len = self.config.width as usize
            * self.config.height as usize
            * self.config.encoding.bytes_per_pixel();
        let mut rng = rand::thread_rng();
        let shift = self.frame_count + self.scene_state as u64 * 37;
        (0..len)
            .map(|i| {
                let base = ((i as u64 + shift) % 256) as u8;
                base.wrapping_add(rng.gen_range(0..4))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_get_distinct_ids() {
        let mut camera = SyntheticCamera::new(CameraConfig {
            width: 8,
            height: 4,
            ..CameraConfig::default()
        })
        .unwrap();
        let a = camera.next_frame().unwrap();
        let b = camera.next_frame().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.byte_len(), 32);
        assert_eq!(camera.stats().outstanding_buffers, 2);

        camera.release(&[a.id()]);
        assert_eq!(
            camera.stats(),
            CameraStats {
                frames_captured: 2,
                outstanding_buffers: 1
            }
        );
    }

    #[test]
    fn rejects_odd_bayer_resolution() {
        let cfg = CameraConfig {
            width: 7,
            ..CameraConfig::default()
        };
        assert!(SyntheticCamera::new(cfg).is_err());

        let rgb = CameraConfig {
            width: 7,
            encoding: ImageEncoding::Rgb8,
            ..CameraConfig::default()
        };
        assert!(SyntheticCamera::new(rgb).is_ok());
    }
}
