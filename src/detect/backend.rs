use anyhow::Result;

use crate::detect::result::DetectionRegion;
use crate::frame::Frame;

/// Detector backend trait.
///
/// A backend is a black box: one frame in, zero or more labelled regions out.
/// Labels are already resolved through `class_names`, so callers never see raw
/// class indices.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Label-index-to-name lookup used by this backend.
    fn class_names(&self) -> &[String];

    /// Run detection on a frame.
    ///
    /// Implementations treat the frame as read-only and must not keep it past the call.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionRegion>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn class_names(&self) -> &[String] {
        (**self).class_names()
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionRegion>> {
        (**self).detect(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
