//! YOLOv8 pre- and post-processing.
//!
//! This is plain Rust over image buffers and `f32` slices so that it runs (and
//! is tested) without an inference runtime. The tract backend feeds it the raw
//! model output.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use std::cmp::Ordering;

use crate::detect::result::BoundingBox;

const LETTERBOX_FILL: u8 = 114;

/// Thresholds and sizes for a YOLOv8 detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloParams {
    /// Square model input edge in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// Mapping between frame pixels and letterboxed model input pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    pub fn for_frame(width: u32, height: u32, input_size: u32) -> Self {
        let size = input_size as f32;
        let scale = (size / width.max(1) as f32).min(size / height.max(1) as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);
        Self {
            scale,
            pad_x: ((input_size - scaled_width) / 2) as f32,
            pad_y: ((input_size - scaled_height) / 2) as f32,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a point in model input space back to frame space.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// Resize `image` into a square `input_size` canvas, preserving aspect ratio.
pub fn letterbox(image: &RgbImage, input_size: u32) -> (RgbImage, Letterbox) {
    let lb = Letterbox::for_frame(image.width(), image.height(), input_size);
    let resized = imageops::resize(image, lb.scaled_width, lb.scaled_height, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(input_size, input_size, Rgb([LETTERBOX_FILL; 3]));
    imageops::replace(&mut canvas, &resized, lb.pad_x as i64, lb.pad_y as i64);
    (canvas, lb)
}

/// A decoded detection before its class index is resolved to a label.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Decode a YOLOv8 output tensor laid out as `[4 + classes, anchors]`.
///
/// Rows 0..4 hold center-x, center-y, width and height in model input pixels;
/// the remaining rows hold per-class scores. Boxes come back in frame pixels,
/// clamped to the frame, after per-class non-maximum suppression.
pub fn decode_output(
    output: &[f32],
    num_anchors: usize,
    letterbox: &Letterbox,
    frame_width: u32,
    frame_height: u32,
    params: &YoloParams,
) -> Result<Vec<RawDetection>> {
    if num_anchors == 0 {
        return Ok(Vec::new());
    }
    if output.len() % num_anchors != 0 {
        return Err(anyhow!(
            "output length {} is not a multiple of {} anchors",
            output.len(),
            num_anchors
        ));
    }
    let attrs = output.len() / num_anchors;
    if attrs <= 4 {
        return Err(anyhow!("output has {} rows, expected 4 box rows plus class scores", attrs));
    }

    let at = |row: usize, anchor: usize| output[row * num_anchors + anchor];
    let mut candidates = Vec::new();
    for anchor in 0..num_anchors {
        let (class_id, confidence) = (4..attrs)
            .map(|row| (row - 4, at(row, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
        if !confidence.is_finite() || confidence < params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
        candidates.push(RawDetection {
            class_id,
            confidence: confidence.min(1.0),
            bbox: BoundingBox::from_xyxy(x1, y1, x2, y2).clamp_to(frame_width, frame_height),
        });
    }

    let mut kept = non_max_suppression(candidates, params.iou_threshold);
    kept.truncate(params.max_detections);
    Ok(kept)
}

/// Greedy per-class NMS. Output is sorted by descending confidence.
pub fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<RawDetection> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let overlaps = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !overlaps {
            kept.push(cand);
        }
    }
    kept
}
