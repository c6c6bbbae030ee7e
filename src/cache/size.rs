use anyhow::{anyhow, Result};
use image::imageops::FilterType;

/// Interpolation used when a cached view is produced at a reduced size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResizeMethod {
    NearestNeighbor,
    Linear,
}

impl ResizeMethod {
    pub(crate) fn filter(self) -> FilterType {
        match self {
            ResizeMethod::NearestNeighbor => FilterType::Nearest,
            ResizeMethod::Linear => FilterType::Triangle,
        }
    }
}

/// Size of a cached view relative to the full decoded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageCacheSize {
    Full,
    HalfNearest,
    HalfLinear,
    QuarterNearest,
    QuarterLinear,
    EighthNearest,
    EighthLinear,
}

impl ImageCacheSize {
    /// Map a downscale multiplier (1, 2, 4 or 8) and method to a cache size.
    pub fn from_scale(multiplier: u32, method: ResizeMethod) -> Result<Self> {
        use ImageCacheSize::*;
        use ResizeMethod::*;
        match (multiplier, method) {
            (1, _) => Ok(Full),
            (2, NearestNeighbor) => Ok(HalfNearest),
            (2, Linear) => Ok(HalfLinear),
            (4, NearestNeighbor) => Ok(QuarterNearest),
            (4, Linear) => Ok(QuarterLinear),
            (8, NearestNeighbor) => Ok(EighthNearest),
            (8, Linear) => Ok(EighthLinear),
            _ => Err(anyhow!(
                "unsupported image cache scale multiplier {}",
                multiplier
            )),
        }
    }

    pub fn scale_divisor(self) -> u32 {
        match self {
            ImageCacheSize::Full => 1,
            ImageCacheSize::HalfNearest | ImageCacheSize::HalfLinear => 2,
            ImageCacheSize::QuarterNearest | ImageCacheSize::QuarterLinear => 4,
            ImageCacheSize::EighthNearest | ImageCacheSize::EighthLinear => 8,
        }
    }

    pub fn method(self) -> ResizeMethod {
        match self {
            ImageCacheSize::Full
            | ImageCacheSize::HalfNearest
            | ImageCacheSize::QuarterNearest
            | ImageCacheSize::EighthNearest => ResizeMethod::NearestNeighbor,
            ImageCacheSize::HalfLinear
            | ImageCacheSize::QuarterLinear
            | ImageCacheSize::EighthLinear => ResizeMethod::Linear,
        }
    }

    /// Rows and columns of this size for a full image of `rows x cols`. Never zero.
    pub fn dims(self, rows: u32, cols: u32) -> (u32, u32) {
        let div = self.scale_divisor();
        ((rows / div).max(1), (cols / div).max(1))
    }
}

/// How much work a cache lookup did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GetType {
    /// Decoded straight from the raw source buffer.
    NewEntry,
    /// Derived from another entry already cached for the same source.
    ResizeIntoExisting,
    /// Exact hit, nothing computed.
    FullyCached,
}
