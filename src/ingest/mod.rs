//! Frame sources.
//!
//! - Camera: a local V4L2 device by index or path (feature: ingest-v4l2), or a
//!   synthetic `stub://` camera
//! - Scripted: a fixed list of frames (tests, demo)
//!
//! Sources hand frames to the loop one at a time. `Ok(None)` means the stream is
//! exhausted; an error means the read failed. The loop treats both as the end of
//! the stream.

mod camera;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
mod scripted;

use anyhow::Result;

use crate::frame::Frame;

pub use camera::{resolve_device, CameraConfig, CameraSource};
pub use scripted::ScriptedSource;

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

pub trait FrameSource {
    /// Acquire the underlying device.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` when the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device. Safe to call more than once.
    fn release(&mut self) {}

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}
