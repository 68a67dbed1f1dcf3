//! Contracts for the external collaborators the engine consumes.
//!
//! The engine never implements these — they are the seams to the
//! detector, the per-zone analysis service, the job status endpoint,
//! the durable zone store, and the environment's frame-grab
//! primitive. `zonewatch-client` provides HTTP implementations.

use async_trait::async_trait;
use zonewatch_core::analysis::ZoneAnalysis;
use zonewatch_core::detection::{BoundingBox, DetectionFrame};
use zonewatch_core::geometry::Point;
use zonewatch_core::job::JobStatus;
use zonewatch_core::zone::Zone;

/// A network or backend failure on an external call.
///
/// Carries only a human-readable message: the engine's loops either
/// swallow these (surfacing them on the event bus) or fail fast to
/// the caller for an explicit retry decision — they never branch on
/// the failure's cause.
#[derive(Debug, Clone, thiserror::Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The external person detector: image bytes in, person boxes out.
///
/// When zone polygons are supplied the detector filters server-side
/// and the returned boxes are already trimmed to the zones; callers
/// on that path must not re-filter.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        image: &[u8],
        zones: Option<&[Vec<Point>]>,
    ) -> Result<Vec<BoundingBox>, TransportError>;
}

/// Environment-specific frame capture for live sources.
///
/// Returns one encoded frame (e.g. JPEG bytes). The cadence,
/// single-flight, and cancellation contract around it belongs to the
/// live sampler, not the grabber.
#[async_trait]
pub trait FrameGrabber: Send + Sync {
    async fn grab_frame(&self) -> Result<Vec<u8>, TransportError>;
}

/// The per-zone analysis service.
#[async_trait]
pub trait ZoneAnalysisService: Send + Sync {
    /// Run a full occupancy analysis of one zone over the feed's
    /// cached detections.
    async fn analyze(
        &self,
        feed_id: &str,
        zone_id: &str,
        frame_step: u32,
    ) -> Result<ZoneAnalysis, TransportError>;
}

/// The feed's sampled detection cache.
#[async_trait]
pub trait DetectionCacheService: Send + Sync {
    /// Fetch the full cached detection list for a feed, in timestamp
    /// order.
    async fn fetch_detections(
        &self,
        feed_id: &str,
    ) -> Result<Vec<DetectionFrame>, TransportError>;
}

/// The backend job status endpoint.
#[async_trait]
pub trait JobStatusService: Send + Sync {
    /// Fetch the current processing status of the feed's job.
    async fn fetch_status(&self, feed_id: &str) -> Result<JobStatus, TransportError>;
}

/// The durable zone CRUD service used for non-live feeds.
///
/// The engine keeps its own in-memory copy and mirrors mutations
/// through this contract; it does not implement the storage.
#[async_trait]
pub trait ZoneDirectory: Send + Sync {
    async fn create(&self, feed_id: &str, zone: &Zone) -> Result<(), TransportError>;
    async fn update(&self, feed_id: &str, zone: &Zone) -> Result<(), TransportError>;
    async fn delete(&self, feed_id: &str, zone_id: &str) -> Result<(), TransportError>;
    async fn list(&self, feed_id: &str) -> Result<Vec<Zone>, TransportError>;
}
