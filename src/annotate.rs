//! Frame annotation.
//!
//! Box outlines are painted straight into the frame's RGB buffer. Captions are
//! carried alongside as `Overlay`s, since text rendering belongs to the display
//! sink (the window sink draws them with the platform font).

use image::{Rgb, RgbImage};

use crate::detect::{BoundingBox, DetectionRegion};
use crate::frame::Frame;

/// Red, for labels in the dangerous set.
pub const DANGER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Green, for everything else.
pub const SAFE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const DEFAULT_THICKNESS: u32 = 2;
/// Captions sit this many pixels above the box's top-left corner.
pub const CAPTION_OFFSET: i32 = 10;

/// What to draw for one region.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub bbox: BoundingBox,
    pub caption: String,
    pub caption_origin: (i32, i32),
    pub color: Rgb<u8>,
    pub dangerous: bool,
}

impl Overlay {
    pub fn for_region(region: &DetectionRegion, dangerous: bool) -> Self {
        Self {
            bbox: region.bbox,
            caption: format!("{} {:.2}", region.label, region.confidence),
            caption_origin: (region.bbox.x1, region.bbox.y1 - CAPTION_OFFSET),
            color: if dangerous { DANGER_COLOR } else { SAFE_COLOR },
            dangerous,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Annotator {
    thickness: u32,
}

impl Annotator {
    pub fn new(thickness: u32) -> Self {
        Self {
            thickness: thickness.max(1),
        }
    }

    /// Paint every overlay's box onto the frame.
    pub fn annotate(&self, frame: &mut Frame, overlays: &[Overlay]) {
        let image = frame.image_mut();
        for overlay in overlays {
            draw_outline(image, overlay.bbox, overlay.color, self.thickness);
        }
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(DEFAULT_THICKNESS)
    }
}

fn draw_outline(image: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>, thickness: u32) {
    for inset in 0..thickness as i32 {
        let (x1, y1, x2, y2) = (
            bbox.x1 + inset,
            bbox.y1 + inset,
            bbox.x2 - inset,
            bbox.y2 - inset,
        );
        if x1 > x2 || y1 > y2 {
            break;
        }
        for x in x1..=x2 {
            put(image, x, y1, color);
            put(image, x, y2, color);
        }
        for y in y1..=y2 {
            put(image, x1, y, color);
            put(image, x2, y, color);
        }
    }
}

fn put(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as u32, y as u32);
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_color_and_caption_follow_danger_flag() {
        let knife = DetectionRegion::new("knife", 0.912, BoundingBox::new(10, 20, 50, 60));
        let overlay = Overlay::for_region(&knife, true);
        assert_eq!(overlay.color, DANGER_COLOR);
        assert_eq!(overlay.caption, "knife 0.91");
        assert_eq!(overlay.caption_origin, (10, 10));

        let person = DetectionRegion::new("person", 0.77, BoundingBox::new(0, 0, 20, 20));
        assert_eq!(Overlay::for_region(&person, false).color, SAFE_COLOR);
    }

    #[test]
    fn annotate_paints_outline_only() {
        let mut frame = Frame::filled(32, 32, [0, 0, 0], 1);
        let region = DetectionRegion::new("gun", 0.5, BoundingBox::new(4, 4, 20, 20));
        let overlays = vec![Overlay::for_region(&region, true)];
        Annotator::default().annotate(&mut frame, &overlays);

        let image = frame.image();
        assert_eq!(image.get_pixel(4, 4), &DANGER_COLOR);
        assert_eq!(image.get_pixel(5, 12), &DANGER_COLOR);
        assert_eq!(image.get_pixel(20, 20), &DANGER_COLOR);
        assert_eq!(image.get_pixel(12, 12), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(3, 3), &Rgb([0, 0, 0]));
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut frame = Frame::filled(8, 8, [0, 0, 0], 1);
        let region = DetectionRegion::new("cup", 0.5, BoundingBox::new(-4, -4, 100, 100));
        Annotator::default().annotate(&mut frame, &[Overlay::for_region(&region, false)]);
        assert_eq!(frame.image().get_pixel(4, 4), &Rgb([0, 0, 0]));
    }
}
