use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use zonewatch_api::config::ServerConfig;
use zonewatch_api::router::build_app_router;
use zonewatch_api::state::AppState;
use zonewatch_core::analysis::ZoneAnalysis;
use zonewatch_core::detection::{BoundingBox, DetectionFrame};
use zonewatch_core::geometry::Point;
use zonewatch_core::job::JobStatus;
use zonewatch_core::zone::Zone;
use zonewatch_engine::session::{Collaborators, SessionRegistry};
use zonewatch_engine::traits::{
    DetectionCacheService, Detector, FrameGrabber, JobStatusService, TransportError,
    ZoneAnalysisService, ZoneDirectory,
};
use zonewatch_engine::EngineConfig;
use zonewatch_events::EventBus;

/// Feed id for which the stub analysis service always fails.
pub const BROKEN_FEED: &str = "broken-feed";

/// Stub backend standing in for every external collaborator.
pub struct StubBackend;

#[async_trait]
impl Detector for StubBackend {
    async fn detect(
        &self,
        _image: &[u8],
        _zones: Option<&[Vec<Point>]>,
    ) -> Result<Vec<BoundingBox>, TransportError> {
        Ok(vec![BoundingBox::new(10.0, 10.0, 20.0, 30.0)])
    }
}

#[async_trait]
impl FrameGrabber for StubBackend {
    async fn grab_frame(&self) -> Result<Vec<u8>, TransportError> {
        Ok(vec![0xFF, 0xD8])
    }
}

#[async_trait]
impl ZoneAnalysisService for StubBackend {
    async fn analyze(
        &self,
        feed_id: &str,
        zone_id: &str,
        frame_step: u32,
    ) -> Result<ZoneAnalysis, TransportError> {
        if feed_id == BROKEN_FEED {
            return Err(TransportError::new("analysis service unavailable"));
        }
        Ok(ZoneAnalysis {
            zone_id: zone_id.to_string(),
            zone_name: String::new(),
            avg_count: 1.5,
            min_count: 1,
            peak_count: 2,
            peak_time: 0.5,
            total_persons_passed: 3,
            frames_analyzed: 2,
            frame_step,
            fps: 25.0,
            duration: 1.0,
            counts_per_frame: vec![1, 2],
            timestamps: vec![0.0, 0.5],
            dwell_times: vec![0.5],
            analyzed_at: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl JobStatusService for StubBackend {
    async fn fetch_status(&self, _feed_id: &str) -> Result<JobStatus, TransportError> {
        Ok(JobStatus::Completed)
    }
}

#[async_trait]
impl DetectionCacheService for StubBackend {
    async fn fetch_detections(
        &self,
        _feed_id: &str,
    ) -> Result<Vec<DetectionFrame>, TransportError> {
        // Three cached frames at 0.5 s spacing, one person each.
        Ok((0..3)
            .map(|i| DetectionFrame {
                timestamp: i as f64 * 0.5,
                frame: i,
                boxes: vec![BoundingBox::new(10.0, 10.0, 20.0, 30.0)],
            })
            .collect())
    }
}

#[async_trait]
impl ZoneDirectory for StubBackend {
    async fn create(&self, _: &str, _: &Zone) -> Result<(), TransportError> {
        Ok(())
    }
    async fn update(&self, _: &str, _: &Zone) -> Result<(), TransportError> {
        Ok(())
    }
    async fn delete(&self, _: &str, _: &str) -> Result<(), TransportError> {
        Ok(())
    }
    async fn list(&self, _: &str) -> Result<Vec<Zone>, TransportError> {
        Ok(vec![])
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        backend_api_url: "http://localhost:5000".to_string(),
        backend_api_token: None,
        snapshot_url: "http://localhost:8080/snapshot".to_string(),
    }
}

/// Build the full application router over stubbed collaborators.
///
/// This uses the same [`build_app_router`] as `main.rs`, so the tests
/// exercise the production middleware stack.
pub fn build_test_app() -> Router {
    let config = test_config();
    let stub = Arc::new(StubBackend);
    let event_bus = Arc::new(EventBus::default());

    let registry = Arc::new(SessionRegistry::new(
        Collaborators {
            detector: Arc::clone(&stub) as _,
            frame_grabber: Arc::clone(&stub) as _,
            analysis: Arc::clone(&stub) as _,
            job_status: Arc::clone(&stub) as _,
            zone_directory: Arc::clone(&stub) as _,
            detections: stub as _,
        },
        Arc::clone(&event_bus),
        EngineConfig::default(),
    ));

    let state = AppState {
        registry,
        config: Arc::new(config.clone()),
        event_bus,
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Assert the response is an error with the given status and `code`
/// field.
pub async fn assert_error(response: Response<Body>, status: StatusCode, code: &str) {
    assert_eq!(response.status(), status);
    let json = body_json(response).await;
    assert_eq!(json["code"], code);
    assert!(json["error"].is_string());
}
