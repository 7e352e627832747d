#![cfg(feature = "display-opencv")]

use anyhow::{Context, Result};
use opencv::core::{Mat, Point, Scalar, Vec3b};
use opencv::prelude::*;
use opencv::{highgui, imgproc};

use super::{DisplayCommand, DisplaySink, QUIT_KEY};
use crate::annotate::Overlay;
use crate::frame::Frame;

const CAPTION_SCALE: f64 = 0.6;
const CAPTION_THICKNESS: i32 = 2;

/// Desktop window backed by OpenCV highgui.
///
/// Captions are rendered here; box outlines are already in the frame pixels.
pub struct WindowSink {
    title: String,
    open: bool,
}

impl WindowSink {
    pub fn new(title: impl Into<String>) -> Result<Self> {
        let title = title.into();
        highgui::named_window(&title, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("failed to open display window '{}'", title))?;
        log::info!("WindowSink: opened '{}' (press {} to quit)", title, QUIT_KEY);
        Ok(Self { title, open: true })
    }

    fn to_bgr_mat(frame: &Frame) -> Result<Mat> {
        let bgr: Vec<Vec3b> = frame
            .image()
            .pixels()
            .map(|p| Vec3b::from([p[2], p[1], p[0]]))
            .collect();
        let mat = Mat::new_rows_cols_with_data(frame.height() as i32, frame.width() as i32, &bgr)
            .context("failed to wrap frame for display")?
            .try_clone()
            .context("failed to copy frame for display")?;
        Ok(mat)
    }
}

impl DisplaySink for WindowSink {
    fn present(&mut self, frame: &Frame, overlays: &[Overlay]) -> Result<DisplayCommand> {
        let mut mat = Self::to_bgr_mat(frame)?;
        for overlay in overlays {
            let [r, g, b] = overlay.color.0;
            imgproc::put_text(
                &mut mat,
                &overlay.caption,
                Point::new(overlay.caption_origin.0, overlay.caption_origin.1),
                imgproc::FONT_HERSHEY_SIMPLEX,
                CAPTION_SCALE,
                Scalar::new(b as f64, g as f64, r as f64, 0.0),
                CAPTION_THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
        }
        highgui::imshow(&self.title, &mat)?;

        let key = highgui::wait_key(1)?;
        if key >= 0 && (key & 0xFF) as u8 as char == QUIT_KEY {
            return Ok(DisplayCommand::Quit);
        }
        Ok(DisplayCommand::Continue)
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            highgui::destroy_all_windows()?;
            self.open = false;
        }
        Ok(())
    }
}

impl Drop for WindowSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("WindowSink: failed to close window: {}", e);
        }
    }
}
