//! Image caching between the camera and the processors.
//!
//! - `ImageCache`: size/channel converted views of one source buffer, each computed once.
//! - `ImageCacheProvider`: ordered caches for recent frames behind a read/write lock,
//!   reclaimed only when no view into them is still held.

mod convert;
mod image_cache;
mod provider;
mod size;

pub use image_cache::ImageCache;
pub use provider::{ImageCacheProvider, DEFAULT_WARN_NUM_CACHES};
pub use size::{GetType, ImageCacheSize, ResizeMethod};
