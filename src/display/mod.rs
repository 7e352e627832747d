//! Display sinks for annotated frames.
//!
//! A sink shows each annotated frame and reports whether the user asked to quit.
//! The poll happens once per frame, after the frame is presented.

#[cfg(feature = "display-opencv")]
mod window;

use anyhow::Result;

use crate::annotate::Overlay;
use crate::frame::Frame;

#[cfg(feature = "display-opencv")]
pub use window::WindowSink;

/// Key that requests a graceful shutdown.
pub const QUIT_KEY: char = 'q';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayCommand {
    Continue,
    Quit,
}

pub trait DisplaySink {
    /// Show the annotated frame, then poll for a quit request.
    fn present(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<DisplayCommand>;

    /// Tear down any display resources. Safe to call more than once.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<D: DisplaySink + ?Sized> DisplaySink for Box<D> {
    fn present(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<DisplayCommand> {
        (**self).present(frame, overlays)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Sink for runs without a window. Overlays go to the debug log.
///
/// It never asks to quit; headless runs end on stream end or interrupt.
#[derive(Default)]
pub struct HeadlessSink {
    presented: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl DisplaySink for HeadlessSink {
    fn present(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<DisplayCommand> {
        self.presented += 1;
        for overlay in overlays {
            log::debug!(
                "frame {}: [{}] {:?}{}",
                frame.sequence(),
                overlay.caption,
                overlay.bbox,
                if overlay.dangerous { " DANGEROUS" } else { "" }
            );
        }
        Ok(DisplayCommand::Continue)
    }
}
