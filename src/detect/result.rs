/// Axis-aligned box in pixel coordinates. Always ordered: `x1 <= x2`, `y1 <= y2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Build a box from two corners in any order.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Truncate float corners to integer pixels, as the detector output is consumed.
    pub fn from_xyxy(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32)
    }

    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> i64 {
        i64::from(self.width()) * i64::from(self.height())
    }

    /// Clamp the box into a `width` x `height` frame.
    pub fn clamp_to(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self::new(
            self.x1.clamp(0, max_x),
            self.y1.clamp(0, max_y),
            self.x2.clamp(0, max_x),
            self.y2.clamp(0, max_y),
        )
    }

    /// Intersection over union.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = i64::from((ix2 - ix1).max(0)) * i64::from((iy2 - iy1).max(0));
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }
}

/// One object instance found by a detector within a single frame.
///
/// Regions live for one loop iteration. They become `DetectionRecord`s when recorded.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRegion {
    pub label: String,
    /// Confidence in `0..=1`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl DetectionRegion {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_orders_corners() {
        let b = BoundingBox::new(50, 40, 10, 20);
        assert_eq!(b, BoundingBox { x1: 10, y1: 20, x2: 50, y2: 40 });
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 20);
    }

    #[test]
    fn clamp_keeps_box_inside_frame() {
        let b = BoundingBox::new(-5, -5, 700, 500).clamp_to(640, 480);
        assert_eq!(b, BoundingBox::new(0, 0, 639, 479));
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(20, 20, 30, 30);
        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), 0.0);

        let half = BoundingBox::new(0, 0, 10, 5);
        assert!((a.iou(&half) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn region_confidence_is_clamped() {
        let r = DetectionRegion::new("knife", 1.4, BoundingBox::new(0, 0, 1, 1));
        assert_eq!(r.confidence, 1.0);
    }
}
