//! Zone model and polygon validation.

use serde::{Deserialize, Serialize};

use crate::analysis::ZoneAnalysis;
use crate::error::CoreError;
use crate::geometry::Point;
use crate::types::{Timestamp, ZoneId};

/// Minimum bounding extent (width and height) of a zone polygon, in
/// pixels. Anything smaller is rejected as degenerate. Default only;
/// the engine exposes this as configuration.
pub const MIN_ZONE_EXTENT_PX: f64 = 10.0;

/// Minimum number of polygon vertices for a simple closed shape.
pub const MIN_POLYGON_POINTS: usize = 3;

/// A user-defined polygonal region over the video frame.
///
/// The `id` is unique and immutable; `name` and `polygon` are mutable
/// via update. Coordinates are in the source frame's pixel space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    pub polygon: Vec<Point>,
    pub created_at: Timestamp,
    /// Most recent analysis result, overwritten wholesale on each run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_analysis: Option<ZoneAnalysis>,
}

/// Request payload for creating a zone.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneDraft {
    #[serde(default)]
    pub name: String,
    pub polygon: Vec<Point>,
}

/// Request payload for updating a zone. Provided fields replace the
/// existing values wholesale; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneUpdate {
    pub name: Option<String>,
    pub polygon: Option<Vec<Point>>,
}

/// Validate a zone polygon: at least three vertices, and a bounding
/// extent of at least `min_extent` pixels in both dimensions.
pub fn validate_polygon(polygon: &[Point], min_extent: f64) -> Result<(), CoreError> {
    if polygon.len() < MIN_POLYGON_POINTS {
        return Err(CoreError::GeometryInvalid(format!(
            "polygon must contain at least {MIN_POLYGON_POINTS} points, got {}",
            polygon.len()
        )));
    }

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in polygon {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let width = max_x - min_x;
    let height = max_y - min_y;
    if width < min_extent || height < min_extent {
        return Err(CoreError::GeometryTooSmall {
            width,
            height,
            min_extent,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
