//! Detection frame model: person bounding boxes tagged with a video
//! timestamp, plus the zone-filtered view consumed by the rendering
//! layer.

use serde::{Deserialize, Serialize};

use crate::geometry::{box_in_any_zone, Point};

/// An axis-aligned person bounding box in frame pixel coordinates.
///
/// Invariant: `x1 < x2` and `y1 < y2`. Serialized as a four-element
/// array `[x1, y1, x2, y2]`, the backend's box wire format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64, f64)", into = "(f64, f64, f64, f64)")]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Geometric center of the box, used for zone membership.
    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

impl From<(f64, f64, f64, f64)> for BoundingBox {
    fn from((x1, y1, x2, y2): (f64, f64, f64, f64)) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

impl From<BoundingBox> for (f64, f64, f64, f64) {
    fn from(b: BoundingBox) -> Self {
        (b.x1, b.y1, b.x2, b.y2)
    }
}

/// One timestamped set of detections produced by the external
/// detector for a single sampled video frame.
///
/// Immutable once received. Detection lists are ordered ascending by
/// `timestamp` within a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionFrame {
    /// Video time of the sampled frame, in seconds.
    pub timestamp: f64,
    /// Source frame index in the video.
    #[serde(default)]
    pub frame: u64,
    /// All person boxes detected in the frame.
    pub boxes: Vec<BoundingBox>,
}

/// A detection frame trimmed to the boxes inside at least one zone.
///
/// Derived, never persisted. With zero zones every box is kept (the
/// "no zones means count everyone" policy).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilteredDetectionFrame {
    /// Video time of the underlying detection frame, in seconds.
    pub timestamp: f64,
    /// Boxes whose centroid lies in at least one zone.
    pub boxes: Vec<BoundingBox>,
}

impl FilteredDetectionFrame {
    /// Number of people counted in this frame.
    pub fn count(&self) -> usize {
        self.boxes.len()
    }
}

/// Trim a detection frame to the boxes inside at least one of the
/// given zone polygons.
pub fn filter_frame(frame: &DetectionFrame, polygons: &[Vec<Point>]) -> FilteredDetectionFrame {
    let boxes = frame
        .boxes
        .iter()
        .filter(|b| box_in_any_zone(b, polygons))
        .copied()
        .collect();

    FilteredDetectionFrame {
        timestamp: frame.timestamp,
        boxes,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    #[test]
    fn centroid_is_box_center() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.centroid(), Point::new(20.0, 40.0));
    }

    #[test]
    fn filter_keeps_boxes_inside_zone() {
        let frame = DetectionFrame {
            timestamp: 1.5,
            frame: 45,
            boxes: vec![
                BoundingBox::new(40.0, 40.0, 60.0, 60.0),    // inside
                BoundingBox::new(200.0, 200.0, 220.0, 240.0), // outside
            ],
        };

        let filtered = filter_frame(&frame, &[square()]);
        assert_eq!(filtered.timestamp, 1.5);
        assert_eq!(filtered.count(), 1);
        assert_eq!(filtered.boxes[0], BoundingBox::new(40.0, 40.0, 60.0, 60.0));
    }

    #[test]
    fn filter_with_no_zones_keeps_everything() {
        let frame = DetectionFrame {
            timestamp: 0.0,
            frame: 0,
            boxes: vec![
                BoundingBox::new(0.0, 0.0, 10.0, 10.0),
                BoundingBox::new(500.0, 500.0, 510.0, 520.0),
            ],
        };

        let filtered = filter_frame(&frame, &[]);
        assert_eq!(filtered.count(), 2);
    }

    #[test]
    fn filter_empty_frame() {
        let frame = DetectionFrame {
            timestamp: 2.0,
            frame: 60,
            boxes: vec![],
        };
        assert_eq!(filter_frame(&frame, &[square()]).count(), 0);
    }

    #[test]
    fn bounding_box_wire_format() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");

        let parsed: BoundingBox = serde_json::from_str("[10, 20, 30, 40]").unwrap();
        assert_eq!(parsed, BoundingBox::new(10.0, 20.0, 30.0, 40.0));
    }

    #[test]
    fn detection_frame_parses_backend_cache_entry() {
        let json = r#"{"timestamp": 0.4, "frame": 12, "boxes": [[1, 2, 3, 4]]}"#;
        let frame: DetectionFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame.frame, 12);
        assert_eq!(frame.boxes.len(), 1);
    }
}
