//! Source frames and derived image views.
//!
//! - `ImageBuffer`: raw sensor data for one capture. Immutable once built, cheap to clone.
//! - `Image<P>`: a decoded (and possibly resized) view derived from an `ImageBuffer`.
//!
//! Derived views carry the `ImageId` of the buffer they came from, so a holder can tell
//! which capture a view belongs to without keeping the buffer itself alive.

use anyhow::{anyhow, Result};
use image::{Luma, Pixel, Rgb};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Identity and encoding
// ----------------------------------------------------------------------------

/// Opaque identity of a captured frame.
///
/// Ids distinguish captures; they are not required to be ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img#{}", self.0)
    }
}

/// Pixel layout of the raw sensor data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageEncoding {
    /// 8-bit Bayer mosaic, RGGB order. Decodes to half the sensor resolution.
    BayerRggb8,
    /// Interleaved 8-bit RGB.
    Rgb8,
    /// 8-bit single channel.
    Gray8,
}

impl ImageEncoding {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ImageEncoding::Rgb8 => 3,
            ImageEncoding::BayerRggb8 | ImageEncoding::Gray8 => 1,
        }
    }

    pub fn has_color(self) -> bool {
        !matches!(self, ImageEncoding::Gray8)
    }

    /// Rows and columns of the full-size decoded image for a sensor of `rows x cols`.
    pub fn decoded_dims(self, rows: u32, cols: u32) -> (u32, u32) {
        match self {
            ImageEncoding::BayerRggb8 => (rows / 2, cols / 2),
            ImageEncoding::Rgb8 | ImageEncoding::Gray8 => (rows, cols),
        }
    }
}

// ----------------------------------------------------------------------------
// ImageBuffer: raw source frame
// ----------------------------------------------------------------------------

/// Raw sensor data for one capture.
///
/// Cloning shares the underlying bytes; nothing ever mutates them after construction.
#[derive(Clone)]
pub struct ImageBuffer {
    data: Arc<[u8]>,
    id: ImageId,
    timestamp_ms: u64,
    encoding: ImageEncoding,
    rows: u32,
    cols: u32,
}

impl ImageBuffer {
    /// Wrap raw sensor bytes. `rows`/`cols` are the sensor resolution.
    pub fn new(
        id: ImageId,
        timestamp_ms: u64,
        encoding: ImageEncoding,
        rows: u32,
        cols: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(anyhow!("image {} has empty resolution {}x{}", id, cols, rows));
        }
        if encoding == ImageEncoding::BayerRggb8 && (rows % 2 != 0 || cols % 2 != 0) {
            return Err(anyhow!(
                "bayer image {} requires even resolution, got {}x{}",
                id,
                cols,
                rows
            ));
        }
        let expected = rows as usize * cols as usize * encoding.bytes_per_pixel();
        if data.len() != expected {
            return Err(anyhow!(
                "image {} has {} bytes, expected {} for {:?} {}x{}",
                id,
                data.len(),
                expected,
                encoding,
                cols,
                rows
            ));
        }
        Ok(Self {
            data: data.into(),
            id,
            timestamp_ms,
            encoding,
            rows,
            cols,
        })
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn encoding(&self) -> ImageEncoding {
        self.encoding
    }

    /// Sensor rows.
    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Sensor columns.
    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn has_color(&self) -> bool {
        self.encoding.has_color()
    }

    /// Rows and columns of the full-size decoded image.
    pub fn decoded_dims(&self) -> (u32, u32) {
        self.encoding.decoded_dims(self.rows, self.cols)
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("id", &self.id)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("encoding", &self.encoding)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Image: derived view
// ----------------------------------------------------------------------------

/// Decoded image derived from an `ImageBuffer`.
pub struct Image<P: Pixel<Subpixel = u8>> {
    id: ImageId,
    timestamp_ms: u64,
    pixels: image::ImageBuffer<P, Vec<u8>>,
}

pub type ImageGray = Image<Luma<u8>>;
pub type ImageRgb = Image<Rgb<u8>>;

impl<P: Pixel<Subpixel = u8>> Image<P> {
    pub(crate) fn new(
        id: ImageId,
        timestamp_ms: u64,
        pixels: image::ImageBuffer<P, Vec<u8>>,
    ) -> Self {
        Self {
            id,
            timestamp_ms,
            pixels,
        }
    }

    /// Id of the source buffer this view was derived from.
    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn num_rows(&self) -> u32 {
        self.pixels.height()
    }

    pub fn num_cols(&self) -> u32 {
        self.pixels.width()
    }

    pub fn pixels(&self) -> &image::ImageBuffer<P, Vec<u8>> {
        &self.pixels
    }

    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }
}

impl<P: Pixel<Subpixel = u8>> fmt::Debug for Image<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("id", &self.id)
            .field("timestamp_ms", &self.timestamp_ms)
            .field("channels", &P::CHANNEL_COUNT)
            .field("rows", &self.num_rows())
            .field("cols", &self.num_cols())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
