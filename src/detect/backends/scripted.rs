use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::labels::coco_class_names;
use crate::detect::result::DetectionRegion;
use crate::frame::Frame;

/// Backend that replays a fixed list of per-frame results.
///
/// The n-th call to `detect` returns the n-th scripted entry. Once the script
/// runs out every further frame yields no detections.
pub struct ScriptedBackend {
    script: VecDeque<Vec<DetectionRegion>>,
    class_names: Vec<String>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<DetectionRegion>>) -> Self {
        Self {
            script: script.into(),
            class_names: coco_class_names(),
        }
    }

    /// Frames left in the script.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<DetectionRegion>> {
        Ok(self.script.pop_front().unwrap_or_default())
    }
}
