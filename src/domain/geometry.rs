use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixels, top-left origin (TLWH).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_tlbr(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x: x1, y: y1, width: x2 - x1, height: y2 - y1 }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Strict overlap test. Boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Intersection over union, 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    /// Clamp the box to a `width` x `height` frame.
    pub fn clamp_to(&self, width: f32, height: f32) -> BBox {
        let x1 = self.x.clamp(0.0, width);
        let y1 = self.y.clamp(0.0, height);
        let x2 = self.right().clamp(0.0, width);
        let y2 = self.bottom().clamp(0.0, height);
        BBox::from_tlbr(x1, y1, x2, y2)
    }

    /// Identity key used by exact-match deduplication: "x,y,width,height".
    pub fn key(&self) -> String {
        format!("{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Region of interest. Detections are counted only when they overlap it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Roi {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Left half of a `width` x `height` frame.
    pub fn left_half(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32 / 2.0, height as f32)
    }

    pub fn as_bbox(&self) -> BBox {
        BBox::new(self.x, self.y, self.width, self.height)
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.x.is_finite() && self.y.is_finite()
    }
}

/// Overlap (not containment) between a detection box and the ROI.
pub fn is_in_roi(bbox: &BBox, roi: &Roi) -> bool {
    bbox.intersects(&roi.as_bbox())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overlap_counts_as_inside() {
        let roi = Roi::new(0.0, 0.0, 100.0, 100.0);
        assert!(is_in_roi(&BBox::new(90.0, 90.0, 50.0, 50.0), &roi));
        assert!(is_in_roi(&BBox::new(10.0, 10.0, 20.0, 20.0), &roi));
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let roi = Roi::new(0.0, 0.0, 100.0, 100.0);
        assert!(!is_in_roi(&BBox::new(100.0, 0.0, 10.0, 10.0), &roi));
        assert!(!is_in_roi(&BBox::new(0.0, -10.0, 10.0, 10.0), &roi));
    }

    #[test]
    fn far_box_is_outside() {
        let roi = Roi::new(0.0, 0.0, 100.0, 100.0);
        assert!(!is_in_roi(&BBox::new(500.0, 500.0, 20.0, 20.0), &roi));
    }

    #[test]
    fn iou_of_offset_boxes() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 10.0, 10.0);
        assert!((a.iou(&b) - 25.0 / 175.0).abs() < 1e-6);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&BBox::new(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn key_is_stable_for_integral_coordinates() {
        assert_eq!(BBox::new(10.0, 10.0, 20.0, 20.0).key(), "10,10,20,20");
        assert_eq!(BBox::new(1.5, 2.0, 3.25, 4.0).key(), "1.5,2,3.25,4");
    }

    #[test]
    fn clamp_keeps_box_inside_frame() {
        let b = BBox::new(-5.0, 10.0, 30.0, 500.0).clamp_to(640.0, 480.0);
        assert_eq!(b, BBox::new(0.0, 10.0, 25.0, 470.0));
    }

    #[test]
    fn left_half_roi() {
        assert_eq!(Roi::left_half(640, 480), Roi::new(0.0, 0.0, 320.0, 480.0));
        assert!(!Roi::new(0.0, 0.0, 0.0, 10.0).is_valid());
    }
}
