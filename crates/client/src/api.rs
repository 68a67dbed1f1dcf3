//! REST API client for the analytics backend.
//!
//! Wraps the backend's feed endpoints (zone CRUD, detection cache,
//! per-zone analysis, job status, single-frame detection) using
//! [`reqwest`].

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use zonewatch_core::analysis::ZoneAnalysis;
use zonewatch_core::detection::{BoundingBox, DetectionFrame};
use zonewatch_core::geometry::Point;
use zonewatch_core::job::JobStatus;
use zonewatch_core::zone::Zone;

/// HTTP client for one backend instance.
pub struct BackendApi {
    client: reqwest::Client,
    api_url: String,
    /// Bearer token attached to every request when set.
    token: Option<String>,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum BackendApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("backend API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------
//
// The backend keys zones `zone_id`/`zone_name`, wraps payloads in
// envelopes (`{"feed": ...}`, `{"message": ..., "analysis": ...}`) and
// emits naive UTC timestamps without an offset, so the domain types do
// not cross the wire directly.

#[derive(Debug, Deserialize)]
struct WireZone {
    zone_id: String,
    #[serde(default)]
    zone_name: String,
    polygon: Vec<Point>,
    created_at: NaiveDateTime,
    #[serde(default)]
    last_analysis: Option<WireAnalysis>,
}

impl From<WireZone> for Zone {
    fn from(wire: WireZone) -> Self {
        Zone {
            id: wire.zone_id,
            name: wire.zone_name,
            polygon: wire.polygon,
            created_at: wire.created_at.and_utc(),
            last_analysis: wire.last_analysis.map(Into::into),
        }
    }
}

/// Body for zone creates and updates. The backend owns every other
/// zone field; ids travel in the path.
#[derive(Debug, Serialize)]
struct ZoneWriteRequest<'a> {
    zone_name: &'a str,
    polygon: &'a [Point],
}

#[derive(Debug, Deserialize)]
struct WireAnalysis {
    zone_id: String,
    #[serde(default)]
    zone_name: String,
    avg_count: f64,
    #[serde(default)]
    min_count: u32,
    peak_count: u32,
    peak_time: f64,
    total_persons_passed: u32,
    frames_analyzed: u32,
    #[serde(default = "default_frame_step")]
    frame_step: u32,
    fps: f64,
    duration: f64,
    #[serde(default)]
    counts_per_frame: Vec<u32>,
    #[serde(default)]
    timestamps: Vec<f64>,
    analyzed_at: NaiveDateTime,
}

fn default_frame_step() -> u32 {
    1
}

impl From<WireAnalysis> for ZoneAnalysis {
    fn from(wire: WireAnalysis) -> Self {
        ZoneAnalysis {
            zone_id: wire.zone_id,
            zone_name: wire.zone_name,
            avg_count: wire.avg_count,
            min_count: wire.min_count,
            peak_count: wire.peak_count,
            peak_time: wire.peak_time,
            total_persons_passed: wire.total_persons_passed,
            frames_analyzed: wire.frames_analyzed,
            frame_step: wire.frame_step,
            fps: wire.fps,
            duration: wire.duration,
            counts_per_frame: wire.counts_per_frame,
            timestamps: wire.timestamps,
            dwell_times: Vec::new(),
            analyzed_at: wire.analyzed_at.and_utc(),
        }
    }
}

/// Feed processing status as the backend spells it. Feeds that never
/// entered the processing pipeline report `ready`, which is
/// indistinguishable from a finished job for our purposes.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireJobStatus {
    Pending,
    Processing,
    #[serde(alias = "ready")]
    #[default]
    Completed,
    Failed,
}

impl From<WireJobStatus> for JobStatus {
    fn from(wire: WireJobStatus) -> Self {
        match wire {
            WireJobStatus::Pending => JobStatus::Pending,
            WireJobStatus::Processing => JobStatus::Processing,
            WireJobStatus::Completed => JobStatus::Completed,
            WireJobStatus::Failed => JobStatus::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ZonesResponse {
    zones: Vec<WireZone>,
}

#[derive(Debug, Deserialize)]
struct DetectionsResponse {
    detections: Vec<DetectionFrame>,
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    feed: FeedStatusResponse,
}

#[derive(Debug, Deserialize)]
struct FeedStatusResponse {
    #[serde(default)]
    status: WireJobStatus,
}

#[derive(Debug, Deserialize)]
struct AnalysisEnvelope {
    analysis: WireAnalysis,
}

#[derive(Debug, Deserialize)]
struct FrameDetectionsResponse {
    boxes: Vec<BoundingBox>,
}

impl BackendApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:5000`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            token: None,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url,
            token: None,
        }
    }

    /// Attach a bearer token to every request.
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}{}", self.api_url, path));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    // ---- zones ----

    /// List a feed's zones via `GET /api/feeds/{feed_id}/zones`.
    pub async fn list_zones(&self, feed_id: &str) -> Result<Vec<Zone>, BackendApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/api/feeds/{feed_id}/zones"))
            .send()
            .await?;

        let parsed: ZonesResponse = Self::parse_response(response).await?;
        Ok(parsed.zones.into_iter().map(Zone::from).collect())
    }

    /// Persist a new zone via `POST /api/feeds/{feed_id}/zones`.
    pub async fn create_zone(&self, feed_id: &str, zone: &Zone) -> Result<(), BackendApiError> {
        let response = self
            .request(reqwest::Method::POST, &format!("/api/feeds/{feed_id}/zones"))
            .json(&ZoneWriteRequest {
                zone_name: &zone.name,
                polygon: &zone.polygon,
            })
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Replace a zone via `PUT /api/feeds/{feed_id}/zones/{zone_id}`.
    pub async fn update_zone(&self, feed_id: &str, zone: &Zone) -> Result<(), BackendApiError> {
        let response = self
            .request(
                reqwest::Method::PUT,
                &format!("/api/feeds/{feed_id}/zones/{}", zone.id),
            )
            .json(&ZoneWriteRequest {
                zone_name: &zone.name,
                polygon: &zone.polygon,
            })
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Delete a zone via `DELETE /api/feeds/{feed_id}/zones/{zone_id}`.
    pub async fn delete_zone(&self, feed_id: &str, zone_id: &str) -> Result<(), BackendApiError> {
        let response = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/feeds/{feed_id}/zones/{zone_id}"),
            )
            .send()
            .await?;

        Self::check_status(response).await
    }

    // ---- detections & analysis ----

    /// Fetch the feed's cached detection frames via
    /// `GET /api/feeds/{feed_id}/detections`.
    pub async fn fetch_detections(
        &self,
        feed_id: &str,
    ) -> Result<Vec<DetectionFrame>, BackendApiError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/api/feeds/{feed_id}/detections"),
            )
            .send()
            .await?;

        let parsed: DetectionsResponse = Self::parse_response(response).await?;
        Ok(parsed.detections)
    }

    /// Run a full occupancy analysis of one zone via
    /// `POST /api/feeds/{feed_id}/analyze_zone`.
    pub async fn analyze_zone(
        &self,
        feed_id: &str,
        zone_id: &str,
        frame_step: u32,
    ) -> Result<ZoneAnalysis, BackendApiError> {
        let body = serde_json::json!({
            "zone_id": zone_id,
            "frame_step": frame_step,
        });

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/api/feeds/{feed_id}/analyze_zone"),
            )
            .json(&body)
            .send()
            .await?;

        let parsed: AnalysisEnvelope = Self::parse_response(response).await?;
        Ok(parsed.analysis.into())
    }

    /// Fetch the feed's processing job status via
    /// `GET /api/feeds/{feed_id}` (the payload arrives wrapped in a
    /// `feed` envelope).
    pub async fn fetch_status(&self, feed_id: &str) -> Result<JobStatus, BackendApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/api/feeds/{feed_id}"))
            .send()
            .await?;

        let parsed: FeedEnvelope = Self::parse_response(response).await?;
        Ok(parsed.feed.status.into())
    }

    /// Detect persons in a single encoded frame via
    /// `POST /api/feeds/analyze_frame` (multipart).
    ///
    /// When `zones` is set the backend filters server-side and the
    /// returned boxes are already trimmed to the zones.
    pub async fn analyze_frame(
        &self,
        image: &[u8],
        zones: Option<&serde_json::Value>,
    ) -> Result<Vec<BoundingBox>, BackendApiError> {
        let frame_part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let mut form = reqwest::multipart::Form::new().part("frame", frame_part);
        if let Some(zones) = zones {
            form = form.text("zones", zones.to_string());
        }

        let response = self
            .request(reqwest::Method::POST, "/api/feeds/analyze_frame")
            .multipart(form)
            .send()
            .await?;

        let parsed: FrameDetectionsResponse = Self::parse_response(response).await?;
        Ok(parsed.boxes)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`BackendApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, BackendApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BackendApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), BackendApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
