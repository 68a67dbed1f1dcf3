pub mod feeds;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /feeds/{feed_id}/...    zone CRUD, detections, playback, analysis,
///                         live sampling, job monitoring
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/feeds", feeds::router())
}
