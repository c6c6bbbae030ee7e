//! Frame ingestion.
//!
//! - `SyntheticCamera`: test-pattern source with a tracked buffer pool
//! - `CameraFeed`: capture thread that resets an `ImageCacheProvider` for every frame
//!   and announces new frames on a `FrameSignal`
//!
//! The feed is the only writer of its provider. Capture buffers return to the camera
//! once the provider reports the caches built on them as cleaned.

pub mod feed;
pub mod synthetic;

pub use feed::{CameraFeed, FeedStats, FrameSignal, FrameSubscription};
pub use synthetic::{CameraConfig, CameraStats, SyntheticCamera};
