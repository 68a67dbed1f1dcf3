//! Point-in-polygon and box-membership tests.
//!
//! Coordinates are in the source frame's pixel space. The rendering
//! layer applies its own viewport scaling before calling in here.

use serde::{Deserialize, Serialize};

use crate::detection::BoundingBox;

/// A 2D point in frame pixel coordinates.
///
/// Serialized as a two-element array `[x, y]`, matching the polygon
/// wire format used by the analytics backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<Point> for (f64, f64) {
    fn from(p: Point) -> Self {
        (p.x, p.y)
    }
}

/// Ray-casting parity test: is `point` inside the polygon?
///
/// Returns `false` for degenerate polygons with fewer than three
/// vertices. Points exactly on an edge may classify either way, but
/// the answer is deterministic for a given input.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[j];

        // Does the edge (a, b) straddle the horizontal ray at point.y?
        if (a.y > point.y) != (b.y > point.y) {
            let x_at_ray = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
            if point.x < x_at_ray {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Is the box's centroid inside at least one of the given polygons?
///
/// An empty polygon list means "count everyone": every box passes.
pub fn box_in_any_zone(bbox: &BoundingBox, polygons: &[Vec<Point>]) -> bool {
    if polygons.is_empty() {
        return true;
    }
    let centroid = bbox.centroid();
    polygons.iter().any(|poly| point_in_polygon(centroid, poly))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
