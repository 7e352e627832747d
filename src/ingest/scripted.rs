use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceStats};
use crate::frame::Frame;

enum Step {
    Frame(Frame),
    Fail(String),
}

/// Frame source that plays back a fixed script, then reports end-of-stream.
///
/// A script step may also be a read failure, to exercise fail-fast handling.
pub struct ScriptedSource {
    name: String,
    steps: VecDeque<Step>,
    connected: bool,
    reads: u64,
    frames_captured: u64,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            name: name.into(),
            steps: frames.into_iter().map(Step::Frame).collect(),
            connected: false,
            reads: 0,
            frames_captured: 0,
        }
    }

    /// `count` uniform frames of the given size.
    pub fn blank(name: impl Into<String>, count: u64, width: u32, height: u32) -> Self {
        let frames = (1..=count)
            .map(|seq| Frame::filled(width, height, [32, 32, 32], seq))
            .collect();
        Self::new(name, frames)
    }

    /// Append a step that fails with `message` when read.
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fail(message.into()));
        self
    }

    /// Calls to `next_frame`, including the one that reported end-of-stream.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl FrameSource for ScriptedSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("ScriptedSource: connected to {} ({} steps)", self.name, self.steps.len());
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("scripted source {} not connected", self.name));
        }
        self.reads += 1;
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => {
                self.frames_captured += 1;
                Ok(Some(frame))
            }
            Some(Step::Fail(message)) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.connected = false;
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            source: self.name.clone(),
        }
    }
}
