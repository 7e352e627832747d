use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::coco_class_names;
use crate::detect::result::DetectionRegion;
use crate::frame::Frame;

/// Stub backend. Reports no detections for any frame.
///
/// Lets the loop run end-to-end (capture, display, quit) without a model.
pub struct StubBackend {
    class_names: Vec<String>,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            class_names: coco_class_names(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectionRegion>> {
        self.frames_seen += 1;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_backend_never_detects() -> Result<()> {
        let mut backend = StubBackend::new();
        let frame = Frame::filled(8, 8, [0, 0, 0], 1);
        assert!(backend.detect(&frame)?.is_empty());
        assert!(backend.detect(&frame)?.is_empty());
        assert_eq!(backend.frames_seen(), 2);
        assert_eq!(backend.class_names().len(), 80);
        Ok(())
    }
}
