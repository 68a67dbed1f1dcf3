//! Route definitions and handlers for the feed engine surface.
//!
//! Mounted at `/feeds`:
//!
//! ```text
//! GET    /{feed_id}/zones                 -> list zones
//! POST   /{feed_id}/zones                 -> create zone
//! POST   /{feed_id}/zones/reload          -> reload zones from the backend
//! PUT    /{feed_id}/zones/{zone_id}       -> update zone
//! DELETE /{feed_id}/zones/{zone_id}       -> delete zone
//!
//! POST   /{feed_id}/detections/refresh    -> pull the detection cache
//! GET    /{feed_id}/detections?t=12.3     -> detections nearest playback time
//!
//! GET    /{feed_id}/playback              -> playback state
//! POST   /{feed_id}/playback/play         -> resume updates
//! POST   /{feed_id}/playback/pause        -> suspend updates
//! POST   /{feed_id}/playback/seek         -> reset the sync cursor
//!
//! POST   /{feed_id}/analysis              -> run aggregate zone analysis
//!
//! GET    /{feed_id}/live                  -> live sampling state
//! POST   /{feed_id}/live/start            -> start live sampling
//! POST   /{feed_id}/live/stop             -> stop live sampling
//!
//! GET    /{feed_id}/job                   -> latest job monitor snapshot
//! POST   /{feed_id}/job/monitor           -> start (or restart) monitoring
//!
//! DELETE /{feed_id}                       -> close the feed session
//! ```
//!
//! Every feed-scoped route accepts `?kind=live` to open the session in
//! volatile (webcam) mode; the kind is fixed on first access.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use zonewatch_core::detection::FilteredDetectionFrame;
use zonewatch_core::zone::{Zone, ZoneDraft, ZoneUpdate};
use zonewatch_engine::aggregate::AggregateReport;
use zonewatch_engine::monitor::JobSnapshot;
use zonewatch_engine::sampler::LiveState;
use zonewatch_engine::session::{FeedKind, FeedSession};
use zonewatch_engine::sync::PlaybackState;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/{feed_id}/zones",
            get(list_zones).post(create_zone),
        )
        .route("/{feed_id}/zones/reload", post(reload_zones))
        .route(
            "/{feed_id}/zones/{zone_id}",
            put(update_zone).delete(delete_zone),
        )
        .route("/{feed_id}/detections/refresh", post(refresh_detections))
        .route("/{feed_id}/detections", get(query_detections))
        .route("/{feed_id}/playback", get(playback_state))
        .route("/{feed_id}/playback/play", post(playback_play))
        .route("/{feed_id}/playback/pause", post(playback_pause))
        .route("/{feed_id}/playback/seek", post(playback_seek))
        .route("/{feed_id}/analysis", post(run_analysis))
        .route("/{feed_id}/live", get(live_state))
        .route("/{feed_id}/live/start", post(live_start))
        .route("/{feed_id}/live/stop", post(live_stop))
        .route("/{feed_id}/job", get(job_snapshot))
        .route("/{feed_id}/job/monitor", post(job_monitor))
        .route("/{feed_id}", delete(close_feed))
}

// ---------------------------------------------------------------------------
// Query/body types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindParam {
    #[default]
    Recorded,
    Live,
}

impl From<KindParam> for FeedKind {
    fn from(kind: KindParam) -> Self {
        match kind {
            KindParam::Recorded => FeedKind::Recorded,
            KindParam::Live => FeedKind::Live,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FeedQuery {
    #[serde(default)]
    kind: KindParam,
}

#[derive(Debug, Deserialize)]
struct DetectionQuery {
    /// Playback time in seconds.
    t: f64,
    #[serde(default)]
    kind: KindParam,
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    /// Analyze every n-th cached frame (default: every frame).
    #[serde(default = "default_frame_step")]
    frame_step: u32,
    /// Restrict the run to these zone ids (default: all zones).
    #[serde(default)]
    zone_ids: Option<Vec<String>>,
}

fn default_frame_step() -> u32 {
    1
}

#[derive(Serialize)]
struct ZonesResponse {
    zones: Vec<Zone>,
}

#[derive(Serialize)]
struct PlaybackResponse {
    state: PlaybackState,
}

#[derive(Serialize)]
struct LiveResponse {
    state: LiveState,
}

async fn session(
    state: &AppState,
    feed_id: &str,
    kind: KindParam,
) -> std::sync::Arc<FeedSession> {
    state.registry.session(feed_id, kind.into()).await
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

async fn list_zones(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<ZonesResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    Ok(Json(ZonesResponse {
        zones: session.zones().await,
    }))
}

async fn create_zone(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
    Json(draft): Json<ZoneDraft>,
) -> AppResult<(StatusCode, Json<Zone>)> {
    let session = session(&state, &feed_id, query.kind).await;
    let zone = session.create_zone(draft).await?;
    Ok((StatusCode::CREATED, Json(zone)))
}

async fn reload_zones(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<ZonesResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    session.reload_zones().await?;
    Ok(Json(ZonesResponse {
        zones: session.zones().await,
    }))
}

async fn update_zone(
    State(state): State<AppState>,
    Path((feed_id, zone_id)): Path<(String, String)>,
    Query(query): Query<FeedQuery>,
    Json(update): Json<ZoneUpdate>,
) -> AppResult<Json<Zone>> {
    let session = session(&state, &feed_id, query.kind).await;
    let zone = session.update_zone(&zone_id, update).await?;
    Ok(Json(zone))
}

async fn delete_zone(
    State(state): State<AppState>,
    Path((feed_id, zone_id)): Path<(String, String)>,
    Query(query): Query<FeedQuery>,
) -> AppResult<StatusCode> {
    let session = session(&state, &feed_id, query.kind).await;
    session.delete_zone(&zone_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Detections & playback
// ---------------------------------------------------------------------------

async fn refresh_detections(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let session = session(&state, &feed_id, query.kind).await;
    let loaded = session.refresh_detections().await?;
    Ok(Json(json!({ "loaded": loaded })))
}

/// Detections nearest the playback clock, trimmed to the current
/// zones. Returns `frame: null` while paused or with no cache loaded.
async fn query_detections(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<DetectionQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let session = session(&state, &feed_id, query.kind).await;
    let frame: Option<FilteredDetectionFrame> = session.filtered_detections(query.t).await;
    Ok(Json(json!({ "frame": frame })))
}

async fn playback_state(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<PlaybackResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    Ok(Json(PlaybackResponse {
        state: session.playback_state().await,
    }))
}

async fn playback_play(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<PlaybackResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    session.play().await;
    Ok(Json(PlaybackResponse {
        state: session.playback_state().await,
    }))
}

async fn playback_pause(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<PlaybackResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    session.pause().await;
    Ok(Json(PlaybackResponse {
        state: session.playback_state().await,
    }))
}

async fn playback_seek(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<PlaybackResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    session.seek().await;
    Ok(Json(PlaybackResponse {
        state: session.playback_state().await,
    }))
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

async fn run_analysis(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
    body: Option<Json<AnalysisRequest>>,
) -> AppResult<Json<AggregateReport>> {
    let (frame_step, zone_ids) = body
        .map(|Json(b)| (b.frame_step, b.zone_ids))
        .unwrap_or((1, None));
    if frame_step == 0 {
        return Err(AppError::BadRequest("frame_step must be at least 1".into()));
    }

    let session = session(&state, &feed_id, query.kind).await;
    let report = session.run_analysis(frame_step, zone_ids.as_deref()).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// Live sampling
// ---------------------------------------------------------------------------

async fn live_state(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<LiveResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    Ok(Json(LiveResponse {
        state: session.live_state().await,
    }))
}

async fn live_start(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<(StatusCode, Json<LiveResponse>)> {
    let session = session(&state, &feed_id, query.kind).await;
    let _rx = session.start_live().await;
    Ok((
        StatusCode::ACCEPTED,
        Json(LiveResponse {
            state: session.live_state().await,
        }),
    ))
}

async fn live_stop(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> AppResult<Json<LiveResponse>> {
    let session = session(&state, &feed_id, query.kind).await;
    session.stop_live().await;
    Ok(Json(LiveResponse {
        state: session.live_state().await,
    }))
}

// ---------------------------------------------------------------------------
// Job monitoring
// ---------------------------------------------------------------------------

async fn job_monitor(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> AppResult<(StatusCode, Json<JobSnapshot>)> {
    let rx = state.registry.monitor_job(&feed_id).await;
    let snapshot = rx.borrow().clone();
    Ok((StatusCode::ACCEPTED, Json(snapshot)))
}

async fn job_snapshot(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> AppResult<Json<JobSnapshot>> {
    state
        .registry
        .job_snapshot(&feed_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job monitor for feed {feed_id}")))
}

// ---------------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------------

async fn close_feed(
    State(state): State<AppState>,
    Path(feed_id): Path<String>,
) -> AppResult<StatusCode> {
    state.registry.close(&feed_id).await;
    Ok(StatusCode::NO_CONTENT)
}
