//! Adapters from [`BackendApi`] to the engine's collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;
use zonewatch_core::analysis::ZoneAnalysis;
use zonewatch_core::detection::BoundingBox;
use zonewatch_core::geometry::Point;
use zonewatch_core::job::JobStatus;
use zonewatch_core::zone::Zone;
use zonewatch_core::detection::DetectionFrame;
use zonewatch_engine::traits::{
    DetectionCacheService, Detector, FrameGrabber, JobStatusService, TransportError,
    ZoneAnalysisService, ZoneDirectory,
};

use crate::api::{BackendApi, BackendApiError};

impl From<BackendApiError> for TransportError {
    fn from(e: BackendApiError) -> Self {
        TransportError::new(e.to_string())
    }
}

#[async_trait]
impl ZoneDirectory for BackendApi {
    async fn create(&self, feed_id: &str, zone: &Zone) -> Result<(), TransportError> {
        Ok(self.create_zone(feed_id, zone).await?)
    }

    async fn update(&self, feed_id: &str, zone: &Zone) -> Result<(), TransportError> {
        Ok(self.update_zone(feed_id, zone).await?)
    }

    async fn delete(&self, feed_id: &str, zone_id: &str) -> Result<(), TransportError> {
        Ok(self.delete_zone(feed_id, zone_id).await?)
    }

    async fn list(&self, feed_id: &str) -> Result<Vec<Zone>, TransportError> {
        Ok(self.list_zones(feed_id).await?)
    }
}

#[async_trait]
impl ZoneAnalysisService for BackendApi {
    async fn analyze(
        &self,
        feed_id: &str,
        zone_id: &str,
        frame_step: u32,
    ) -> Result<ZoneAnalysis, TransportError> {
        Ok(self.analyze_zone(feed_id, zone_id, frame_step).await?)
    }
}

#[async_trait]
impl DetectionCacheService for BackendApi {
    async fn fetch_detections(
        &self,
        feed_id: &str,
    ) -> Result<Vec<DetectionFrame>, TransportError> {
        Ok(BackendApi::fetch_detections(self, feed_id).await?)
    }
}

#[async_trait]
impl JobStatusService for BackendApi {
    async fn fetch_status(&self, feed_id: &str) -> Result<JobStatus, TransportError> {
        Ok(BackendApi::fetch_status(self, feed_id).await?)
    }
}

#[async_trait]
impl Detector for BackendApi {
    async fn detect(
        &self,
        image: &[u8],
        zones: Option<&[Vec<Point>]>,
    ) -> Result<Vec<BoundingBox>, TransportError> {
        // Zones travel as a JSON list of point lists, matching the
        // backend's multipart contract.
        let zones_json = zones
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| TransportError::new(format!("zone serialization failed: {e}")))?;

        Ok(self.analyze_frame(image, zones_json.as_ref()).await?)
    }
}

/// Bundle one [`BackendApi`] plus a frame grabber into the engine's
/// collaborator set.
pub fn backend_collaborators(
    api: Arc<BackendApi>,
    frame_grabber: Arc<dyn FrameGrabber>,
) -> zonewatch_engine::session::Collaborators {
    zonewatch_engine::session::Collaborators {
        detector: Arc::clone(&api) as _,
        frame_grabber,
        analysis: Arc::clone(&api) as _,
        job_status: Arc::clone(&api) as _,
        zone_directory: Arc::clone(&api) as _,
        detections: api as _,
    }
}

/// Frame grabber that pulls a still image from an HTTP snapshot
/// endpoint (IP cameras and stream gateways commonly expose one).
pub struct SnapshotGrabber {
    client: reqwest::Client,
    snapshot_url: String,
}

impl SnapshotGrabber {
    pub fn new(snapshot_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            snapshot_url,
        }
    }
}

#[async_trait]
impl FrameGrabber for SnapshotGrabber {
    async fn grab_frame(&self) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(&self.snapshot_url)
            .send()
            .await
            .map_err(|e| TransportError::new(format!("snapshot request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(format!(
                "snapshot endpoint returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(format!("snapshot body read failed: {e}")))?;
        Ok(bytes.to_vec())
    }
}
