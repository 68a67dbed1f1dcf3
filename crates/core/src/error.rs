//! Domain-level error type shared across the workspace.

/// Errors produced by domain validation and store operations.
///
/// Transport-level failures (network, backend status codes) are a
/// separate concern and live with the collaborator contracts in
/// `zonewatch-engine`.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup failed.
    #[error("{entity} with id {id} not found")]
    NotFound {
        /// Entity kind, e.g. `"zone"` or `"feed"`.
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// A polygon with fewer than three vertices.
    #[error("Invalid polygon: {0}")]
    GeometryInvalid(String),

    /// A zone whose bounding extent collapses below the minimum size.
    #[error("Zone too small: {width:.0}x{height:.0} px (minimum {min_extent:.0} px per side)")]
    GeometryTooSmall {
        /// Bounding-box width of the rejected polygon, in pixels.
        width: f64,
        /// Bounding-box height of the rejected polygon, in pixels.
        height: f64,
        /// The configured minimum extent per side.
        min_extent: f64,
    },

    /// A request failed field-level validation.
    #[error("Validation error: {0}")]
    Validation(String),
}
