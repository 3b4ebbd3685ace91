use serde::Serialize;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        if self.w <= 0.0 || self.h <= 0.0 {
            return 0.0;
        }
        self.w * self.h
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// What a detection claims to have seen.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DetectionLabel {
    /// A cat, as classified by an object-detection model.
    Cat,
    /// Unclassified motion in the scene (CPU differencing backend).
    Motion,
    Unknown,
}

/// One detection candidate for a single frame.
///
/// Detections carry no identity across frames; the pipeline only aggregates
/// them into a per-frame "is a cat present" signal.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Confidence in 0..=1.
    pub confidence: f32,
    pub label: DetectionLabel,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, label: DetectionLabel) -> Self {
        Self {
            bbox,
            confidence,
            label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes_have_zero_area() {
        assert_eq!(BoundingBox::new(10.0, 10.0, 0.0, 5.0).area(), 0.0);
        assert_eq!(BoundingBox::new(10.0, 10.0, -2.0, 5.0).area(), 0.0);
        assert_eq!(BoundingBox::new(0.0, 0.0, 4.0, 5.0).area(), 20.0);
    }
}
