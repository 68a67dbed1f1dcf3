//! Per-feed sessions and the registry that owns them.
//!
//! A [`FeedSession`] bundles everything the engine tracks for one
//! feed: its zone store, its playback synchronizer, an optional live
//! sampling session, and handles to the shared collaborators. The
//! [`SessionRegistry`] hands out one session per feed id and decides
//! durable vs volatile zone storage from the feed kind.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex, RwLock};
use zonewatch_core::detection::{DetectionFrame, FilteredDetectionFrame};
use zonewatch_core::job::JobStatus;
use zonewatch_core::types::{FeedId, ZoneId};
use zonewatch_core::zone::{Zone, ZoneDraft, ZoneUpdate};
use zonewatch_events::{EngineEvent, EventBus};

use crate::aggregate::{AggregateReport, ZoneAnalysisAggregator};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::monitor::{JobMonitorRegistry, JobSnapshot};
use crate::sampler::{LiveSampler, LiveSession, LiveState};
use crate::store::ZoneStore;
use crate::sync::{DetectionSynchronizer, PlaybackState};
use crate::traits::{
    DetectionCacheService, Detector, FrameGrabber, JobStatusService, ZoneAnalysisService,
    ZoneDirectory,
};

/// The external services the engine talks to, bundled for wiring.
#[derive(Clone)]
pub struct Collaborators {
    pub detector: Arc<dyn Detector>,
    pub frame_grabber: Arc<dyn FrameGrabber>,
    pub analysis: Arc<dyn ZoneAnalysisService>,
    pub job_status: Arc<dyn JobStatusService>,
    pub zone_directory: Arc<dyn ZoneDirectory>,
    pub detections: Arc<dyn DetectionCacheService>,
}

/// How a feed's detections are produced, which decides zone storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    /// An uploaded/ingested video with a durable zone directory.
    Recorded,
    /// An ephemeral live source; zones live only in memory.
    Live,
}

/// All engine state for a single feed.
pub struct FeedSession {
    feed_id: FeedId,
    kind: FeedKind,
    store: Arc<ZoneStore>,
    synchronizer: Mutex<DetectionSynchronizer>,
    live: Mutex<Option<LiveSession>>,
    aggregator: ZoneAnalysisAggregator,
    collaborators: Collaborators,
    events: Arc<EventBus>,
    config: EngineConfig,
}

impl FeedSession {
    fn new(
        feed_id: FeedId,
        kind: FeedKind,
        collaborators: Collaborators,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        let store = match kind {
            FeedKind::Recorded => Arc::new(ZoneStore::durable(
                feed_id.clone(),
                config.min_zone_extent_px,
                Arc::clone(&collaborators.zone_directory),
            )),
            FeedKind::Live => Arc::new(ZoneStore::volatile(
                feed_id.clone(),
                config.min_zone_extent_px,
            )),
        };

        let aggregator = ZoneAnalysisAggregator::new(
            Arc::clone(&collaborators.analysis),
            Arc::clone(&events),
        );

        Self {
            feed_id,
            kind,
            store,
            synchronizer: Mutex::new(DetectionSynchronizer::new(Vec::new(), &config)),
            live: Mutex::new(None),
            aggregator,
            collaborators,
            events,
            config,
        }
    }

    pub fn feed_id(&self) -> &FeedId {
        &self.feed_id
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn store(&self) -> &ZoneStore {
        &self.store
    }

    // -- Zones ------------------------------------------------------------

    pub async fn create_zone(&self, draft: ZoneDraft) -> Result<Zone, EngineError> {
        self.store.create(draft).await
    }

    pub async fn update_zone(
        &self,
        zone_id: &str,
        update: ZoneUpdate,
    ) -> Result<Zone, EngineError> {
        self.store.update(zone_id, update).await
    }

    pub async fn delete_zone(&self, zone_id: &str) -> Result<(), EngineError> {
        self.store.delete(zone_id).await
    }

    pub async fn zones(&self) -> Vec<Zone> {
        self.store.list().await
    }

    /// Refresh the zone list from the durable directory. No-op for
    /// live feeds.
    pub async fn reload_zones(&self) -> Result<(), EngineError> {
        self.store.load().await
    }

    // -- Playback synchronization -----------------------------------------

    /// Install the feed's detection cache into the synchronizer. The
    /// cursor and playback state reset with the new list.
    pub async fn load_detections(&self, frames: Vec<DetectionFrame>) {
        let mut sync = self.synchronizer.lock().await;
        *sync = DetectionSynchronizer::new(frames, &self.config);
        tracing::debug!(
            feed_id = %self.feed_id,
            frames = sync.frame_count(),
            "Detection cache installed"
        );
    }

    /// Fetch the feed's detection cache from the backend and install
    /// it. Returns the number of frames loaded.
    pub async fn refresh_detections(&self) -> Result<usize, EngineError> {
        let frames = self
            .collaborators
            .detections
            .fetch_detections(&self.feed_id)
            .await?;
        let count = frames.len();
        self.load_detections(frames).await;
        Ok(count)
    }

    pub async fn play(&self) {
        self.synchronizer.lock().await.play();
    }

    pub async fn pause(&self) {
        self.synchronizer.lock().await.pause();
    }

    pub async fn seek(&self) {
        self.synchronizer.lock().await.seek();
    }

    pub async fn playback_state(&self) -> PlaybackState {
        self.synchronizer.lock().await.state()
    }

    /// Detections nearest playback time `t`, trimmed to the current
    /// zone set. `None` while paused or with no cache loaded.
    pub async fn filtered_detections(&self, t: f64) -> Option<FilteredDetectionFrame> {
        let polygons = self.store.polygons().await;
        self.synchronizer.lock().await.sample(t, &polygons)
    }

    // -- Live sampling ----------------------------------------------------

    /// Start live sampling. Idempotent: if a session is already
    /// running, returns a new subscription to it instead of spawning a
    /// second loop.
    pub async fn start_live(&self) -> broadcast::Receiver<FilteredDetectionFrame> {
        let mut guard = self.live.lock().await;
        if let Some(session) = guard.as_ref() {
            return session.subscribe();
        }

        let sampler = LiveSampler::new(
            self.feed_id.clone(),
            Arc::clone(&self.collaborators.frame_grabber),
            Arc::clone(&self.collaborators.detector),
            Arc::clone(&self.store),
            Arc::clone(&self.events),
            self.config.clone(),
        );
        let session = sampler.start();
        let rx = session.subscribe();
        *guard = Some(session);
        rx
    }

    /// Stop live sampling, discarding any capture still in flight.
    pub async fn stop_live(&self) {
        if let Some(session) = self.live.lock().await.take() {
            session.stop().await;
        }
    }

    pub async fn live_state(&self) -> LiveState {
        match self.live.lock().await.as_ref() {
            Some(session) => session.state(),
            None => LiveState::Stopped,
        }
    }

    // -- Analysis ---------------------------------------------------------

    /// Run the aggregate occupancy analysis over this feed's zones,
    /// or over the requested subset when `zone_ids` is set.
    pub async fn run_analysis(
        &self,
        frame_step: u32,
        zone_ids: Option<&[ZoneId]>,
    ) -> Result<AggregateReport, EngineError> {
        self.aggregator
            .run(&self.feed_id, &self.store, frame_step, zone_ids)
            .await
    }
}

type SessionMap = Arc<RwLock<HashMap<FeedId, Arc<FeedSession>>>>;

/// Hands out one [`FeedSession`] per feed id.
///
/// Must be constructed inside a tokio runtime: it spawns a listener
/// that reloads a feed's zones and detection cache when its
/// processing job completes.
pub struct SessionRegistry {
    collaborators: Collaborators,
    events: Arc<EventBus>,
    config: EngineConfig,
    monitors: JobMonitorRegistry,
    sessions: SessionMap,
}

impl SessionRegistry {
    pub fn new(collaborators: Collaborators, events: Arc<EventBus>, config: EngineConfig) -> Self {
        let monitors = JobMonitorRegistry::new(
            Arc::clone(&collaborators.job_status),
            Arc::clone(&events),
            config.clone(),
        );
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        tokio::spawn(reload_on_job_completion(
            events.subscribe(),
            Arc::clone(&sessions),
        ));
        Self {
            collaborators,
            events,
            config,
            monitors,
            sessions,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Fetch or create the session for a feed. The kind is fixed on
    /// first access; later calls return the existing session
    /// regardless of the kind passed.
    pub async fn session(&self, feed_id: &str, kind: FeedKind) -> Arc<FeedSession> {
        if let Some(existing) = self.sessions.read().await.get(feed_id) {
            return Arc::clone(existing);
        }

        let mut guard = self.sessions.write().await;
        // Double-check under the write lock.
        if let Some(existing) = guard.get(feed_id) {
            return Arc::clone(existing);
        }

        let session = Arc::new(FeedSession::new(
            feed_id.to_string(),
            kind,
            self.collaborators.clone(),
            Arc::clone(&self.events),
            self.config.clone(),
        ));
        guard.insert(feed_id.to_string(), Arc::clone(&session));
        tracing::info!(feed_id, kind = ?kind, "Feed session created");
        session
    }

    /// The session for a feed, if one exists.
    pub async fn get(&self, feed_id: &str) -> Option<Arc<FeedSession>> {
        self.sessions.read().await.get(feed_id).cloned()
    }

    /// Tear down a feed's session: stops live sampling and the job
    /// monitor, then drops the session.
    pub async fn close(&self, feed_id: &str) {
        let removed = self.sessions.write().await.remove(feed_id);
        if let Some(session) = removed {
            session.stop_live().await;
            self.monitors.stop(feed_id).await;
            tracing::info!(feed_id, "Feed session closed");
        }
    }

    // -- Job monitoring ---------------------------------------------------

    /// Start (or restart) monitoring the feed's processing job.
    pub async fn monitor_job(&self, feed_id: &str) -> watch::Receiver<JobSnapshot> {
        self.monitors.start(feed_id.to_string()).await
    }

    pub async fn job_snapshot(&self, feed_id: &str) -> Option<JobSnapshot> {
        self.monitors.snapshot(feed_id).await
    }
}

/// Refresh a feed's zones and detection cache when its processing job
/// completes, so playback picks up the freshly processed data. Runs
/// until the event bus closes; a superseded or failed job triggers
/// nothing.
async fn reload_on_job_completion(mut rx: broadcast::Receiver<EngineEvent>, sessions: SessionMap) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Reload listener lagged behind the event bus");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return,
        };

        let EngineEvent::JobMonitorFinished {
            feed_id,
            status: JobStatus::Completed,
            ..
        } = event
        else {
            continue;
        };

        let session = sessions.read().await.get(&feed_id).cloned();
        let Some(session) = session else { continue };

        if let Err(e) = session.reload_zones().await {
            tracing::warn!(feed_id = %feed_id, error = %e, "Zone reload after job completion failed");
        }
        match session.refresh_detections().await {
            Ok(frames) => {
                tracing::info!(feed_id = %feed_id, frames, "Feed data reloaded after job completion");
            }
            Err(e) => {
                tracing::warn!(feed_id = %feed_id, error = %e, "Detection reload after job completion failed");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use zonewatch_core::analysis::ZoneAnalysis;
    use zonewatch_core::detection::BoundingBox;
    use zonewatch_core::geometry::Point;
    use zonewatch_core::job::JobStatus;

    use crate::traits::TransportError;

    struct NullCollaborators;

    #[async_trait]
    impl Detector for NullCollaborators {
        async fn detect(
            &self,
            _image: &[u8],
            _zones: Option<&[Vec<Point>]>,
        ) -> Result<Vec<BoundingBox>, TransportError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl FrameGrabber for NullCollaborators {
        async fn grab_frame(&self) -> Result<Vec<u8>, TransportError> {
            Ok(vec![])
        }
    }

    #[async_trait]
    impl ZoneAnalysisService for NullCollaborators {
        async fn analyze(
            &self,
            _feed_id: &str,
            zone_id: &str,
            frame_step: u32,
        ) -> Result<ZoneAnalysis, TransportError> {
            Ok(ZoneAnalysis {
                zone_id: zone_id.to_string(),
                zone_name: String::new(),
                avg_count: 1.0,
                min_count: 1,
                peak_count: 1,
                peak_time: 0.0,
                total_persons_passed: 1,
                frames_analyzed: 1,
                frame_step,
                fps: 25.0,
                duration: 1.0,
                counts_per_frame: vec![1],
                timestamps: vec![0.0],
                dwell_times: vec![],
                analyzed_at: chrono::Utc::now(),
            })
        }
    }

    #[async_trait]
    impl JobStatusService for NullCollaborators {
        async fn fetch_status(&self, _feed_id: &str) -> Result<JobStatus, TransportError> {
            Ok(JobStatus::Completed)
        }
    }

    #[async_trait]
    impl DetectionCacheService for NullCollaborators {
        async fn fetch_detections(
            &self,
            _feed_id: &str,
        ) -> Result<Vec<DetectionFrame>, TransportError> {
            Ok(vec![DetectionFrame {
                timestamp: 0.0,
                frame: 0,
                boxes: vec![BoundingBox::new(10.0, 10.0, 20.0, 20.0)],
            }])
        }
    }

    #[async_trait]
    impl ZoneDirectory for NullCollaborators {
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

    fn collaborators() -> Collaborators {
        let null = Arc::new(NullCollaborators);
        Collaborators {
            detector: Arc::clone(&null) as _,
            frame_grabber: Arc::clone(&null) as _,
            analysis: Arc::clone(&null) as _,
            job_status: Arc::clone(&null) as _,
            zone_directory: Arc::clone(&null) as _,
            detections: null as _,
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            collaborators(),
            Arc::new(EventBus::default()),
            EngineConfig::default(),
        )
    }

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ]
    }

    #[tokio::test]
    async fn sessions_are_shared_per_feed() {
        let registry = registry();
        let a = registry.session("feed-1", FeedKind::Recorded).await;
        let b = registry.session("feed-1", FeedKind::Recorded).await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.session("feed-2", FeedKind::Recorded).await;
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn feed_kind_decides_storage_mode() {
        let registry = registry();
        let recorded = registry.session("video-1", FeedKind::Recorded).await;
        assert!(!recorded.store().is_volatile());

        let live = registry.session("webcam", FeedKind::Live).await;
        assert!(live.store().is_volatile());
    }

    #[tokio::test]
    async fn playback_flow_filters_against_current_zones() {
        let registry = registry();
        let session = registry.session("webcam", FeedKind::Live).await;

        session
            .load_detections(vec![DetectionFrame {
                timestamp: 0.0,
                frame: 0,
                boxes: vec![BoundingBox::new(10.0, 10.0, 20.0, 20.0)],
            }])
            .await;

        // Paused: nothing comes out.
        assert!(session.filtered_detections(0.0).await.is_none());

        session.play().await;
        assert_eq!(session.playback_state().await, PlaybackState::Playing);
        // No zones: everyone counts.
        assert_eq!(session.filtered_detections(0.0).await.unwrap().count(), 1);

        // A zone far from the box excludes it on the next query.
        session
            .create_zone(ZoneDraft {
                name: "far".into(),
                polygon: vec![
                    Point::new(500.0, 500.0),
                    Point::new(600.0, 500.0),
                    Point::new(600.0, 600.0),
                    Point::new(500.0, 600.0),
                ],
            })
            .await
            .unwrap();
        assert_eq!(session.filtered_detections(0.0).await.unwrap().count(), 0);
    }

    #[tokio::test]
    async fn refresh_detections_installs_backend_cache() {
        let registry = registry();
        let session = registry.session("video-1", FeedKind::Recorded).await;

        let loaded = session.refresh_detections().await.unwrap();
        assert_eq!(loaded, 1);

        session.play().await;
        assert_eq!(session.filtered_detections(0.0).await.unwrap().count(), 1);
    }

    #[tokio::test]
    async fn seek_is_observable_through_the_session() {
        let registry = registry();
        let session = registry.session("webcam", FeedKind::Live).await;
        session
            .load_detections(vec![DetectionFrame {
                timestamp: 0.0,
                frame: 0,
                boxes: vec![],
            }])
            .await;

        session.play().await;
        session.seek().await;
        assert_eq!(session.playback_state().await, PlaybackState::Seeking);

        session.filtered_detections(0.0).await.unwrap();
        assert_eq!(session.playback_state().await, PlaybackState::Playing);
    }

    #[tokio::test(start_paused = true)]
    async fn start_live_is_idempotent() {
        let registry = registry();
        let session = registry.session("webcam", FeedKind::Live).await;

        let _rx1 = session.start_live().await;
        let _rx2 = session.start_live().await;
        assert_ne!(session.live_state().await, LiveState::Stopped);

        session.stop_live().await;
        assert_eq!(session.live_state().await, LiveState::Stopped);

        // Stopping twice is harmless.
        session.stop_live().await;
    }

    #[tokio::test]
    async fn run_analysis_records_results() {
        let registry = registry();
        let session = registry.session("video-1", FeedKind::Recorded).await;
        let zone = session
            .create_zone(ZoneDraft {
                name: "hall".into(),
                polygon: square(),
            })
            .await
            .unwrap();

        let report = session.run_analysis(1, None).await.unwrap();
        assert_eq!(report.success_count, 1);
        assert!(session
            .store()
            .get(&zone.id)
            .await
            .unwrap()
            .last_analysis
            .is_some());
    }

    #[tokio::test]
    async fn run_analysis_honours_a_zone_subset() {
        let registry = registry();
        let session = registry.session("video-1", FeedKind::Recorded).await;

        let mut ids = Vec::new();
        for (i, name) in ["a", "b"].iter().enumerate() {
            let polygon = vec![
                Point::new(i as f64 * 200.0, 0.0),
                Point::new(i as f64 * 200.0 + 100.0, 0.0),
                Point::new(i as f64 * 200.0 + 100.0, 100.0),
                Point::new(i as f64 * 200.0, 100.0),
            ];
            let zone = session
                .create_zone(ZoneDraft {
                    name: name.to_string(),
                    polygon,
                })
                .await
                .unwrap();
            ids.push(zone.id);
        }

        let subset = vec![ids[1].clone()];
        let report = session.run_analysis(1, Some(&subset)).await.unwrap();
        assert_eq!(report.total_count, 1);
        assert_eq!(report.analyses[0].zone_id, ids[1]);
        assert!(session
            .store()
            .get(&ids[0])
            .await
            .unwrap()
            .last_analysis
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn completed_job_reloads_feed_data() {
        let registry = registry();
        let session = registry.session("video-1", FeedKind::Recorded).await;
        session.play().await;
        assert!(session.filtered_detections(0.0).await.is_none());

        let mut rx = registry.monitor_job("video-1").await;
        tokio::time::timeout(std::time::Duration::from_secs(60), async {
            loop {
                if rx.borrow().finished {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        // The reload runs off the event bus; wait for it to land.
        // Installing the refreshed cache resets playback, so resume
        // before each probe.
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                session.play().await;
                if session.filtered_detections(0.0).await.is_some() {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("detections should be refreshed after job completion");
    }

    #[tokio::test(start_paused = true)]
    async fn close_tears_down_live_session() {
        let registry = registry();
        let session = registry.session("webcam", FeedKind::Live).await;
        let _rx = session.start_live().await;

        registry.close("webcam").await;
        assert!(registry.get("webcam").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn job_monitor_reachable_through_registry() {
        let registry = registry();
        let mut rx = registry.monitor_job("video-1").await;

        tokio::time::timeout(std::time::Duration::from_secs(60), async {
            loop {
                if rx.borrow().finished {
                    break;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        let snapshot = registry.job_snapshot("video-1").await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Completed);
        assert!(!snapshot.timed_out);
    }
}
