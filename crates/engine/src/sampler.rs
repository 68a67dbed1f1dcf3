//! Fixed-cadence live sampling loop.
//!
//! While a live source is active the sampler captures a frame every
//! 300 ms (configurable), sends it to the external detector together
//! with the current zone polygons, and republishes the returned boxes
//! as a [`FilteredDetectionFrame`] stream. The loop is single-flight:
//! a cycle whose capture/detect round trip has not returned causes
//! subsequent ticks to be skipped entirely, never queued. Per-cycle
//! failures are swallowed (surfaced on the event bus) and the loop
//! continues at the next tick; an explicit stop discards any result
//! still in flight.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use zonewatch_core::detection::FilteredDetectionFrame;
use zonewatch_core::types::FeedId;
use zonewatch_events::{EngineEvent, EventBus};
use zonewatch_events::bus::EventSource;

use crate::config::EngineConfig;
use crate::store::ZoneStore;
use crate::traits::{Detector, FrameGrabber, TransportError};

/// Broadcast capacity for the outgoing frame stream. Consumers are
/// renderers that only care about the freshest samples.
const FRAME_CHANNEL_CAPACITY: usize = 16;

/// Explicit live session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveState {
    Stopped,
    /// Spawned but no cycle has completed yet.
    Starting,
    /// At least one capture/detect cycle has completed.
    Active,
}

/// Factory for live sampling sessions on one feed.
pub struct LiveSampler {
    feed_id: FeedId,
    grabber: Arc<dyn FrameGrabber>,
    detector: Arc<dyn Detector>,
    store: Arc<ZoneStore>,
    events: Arc<EventBus>,
    config: EngineConfig,
}

/// A running live sampling loop.
///
/// Dropping the session does not stop the loop; call
/// [`LiveSession::stop`] to cancel it and tear down state.
pub struct LiveSession {
    feed_id: FeedId,
    cancel: CancellationToken,
    frames_tx: broadcast::Sender<FilteredDetectionFrame>,
    state_rx: watch::Receiver<LiveState>,
    task: tokio::task::JoinHandle<()>,
    events: Arc<EventBus>,
}

impl LiveSampler {
    pub fn new(
        feed_id: FeedId,
        grabber: Arc<dyn FrameGrabber>,
        detector: Arc<dyn Detector>,
        store: Arc<ZoneStore>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            feed_id,
            grabber,
            detector,
            store,
            events,
            config,
        }
    }

    /// Spawn the sampling loop and hand back the session handle.
    pub fn start(&self) -> LiveSession {
        let (frames_tx, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(LiveState::Starting);
        let cancel = CancellationToken::new();

        let loop_ctx = SamplerLoop {
            feed_id: self.feed_id.clone(),
            grabber: Arc::clone(&self.grabber),
            detector: Arc::clone(&self.detector),
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            interval: self.config.live_sample_interval,
            frames_tx: frames_tx.clone(),
            state_tx,
            cancel: cancel.clone(),
        };

        let task = tokio::spawn(loop_ctx.run());

        self.events.publish(EngineEvent::LiveStarted {
            feed_id: self.feed_id.clone(),
        });
        tracing::info!(feed_id = %self.feed_id, "Live sampling started");

        LiveSession {
            feed_id: self.feed_id.clone(),
            cancel,
            frames_tx,
            state_rx,
            task,
            events: Arc::clone(&self.events),
        }
    }
}

impl LiveSession {
    /// Subscribe to the stream of filtered detection frames.
    pub fn subscribe(&self) -> broadcast::Receiver<FilteredDetectionFrame> {
        self.frames_tx.subscribe()
    }

    pub fn state(&self) -> LiveState {
        *self.state_rx.borrow()
    }

    /// Stop the loop. Any capture still in flight is discarded — the
    /// session's state is torn down the moment this is called.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), self.task).await;

        self.events.publish(EngineEvent::LiveStopped {
            feed_id: self.feed_id.clone(),
        });
        tracing::info!(feed_id = %self.feed_id, "Live sampling stopped");
    }
}

/// Owned context for the spawned sampling loop.
struct SamplerLoop {
    feed_id: FeedId,
    grabber: Arc<dyn FrameGrabber>,
    detector: Arc<dyn Detector>,
    store: Arc<ZoneStore>,
    events: Arc<EventBus>,
    interval: std::time::Duration,
    frames_tx: broadcast::Sender<FilteredDetectionFrame>,
    state_tx: watch::Sender<LiveState>,
    cancel: CancellationToken,
}

impl SamplerLoop {
    async fn run(self) {
        let started = Instant::now();
        let mut interval = tokio::time::interval(self.interval);
        // Single-flight: ticks that fire while a cycle is still in
        // flight are dropped, not queued.
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    break;
                }
                _ = interval.tick() => {
                    match self.cycle(started).await {
                        Ok(frame) => {
                            // The source may have been stopped while the
                            // round trip was in flight; its result must
                            // not touch torn-down state.
                            if self.cancel.is_cancelled() {
                                break;
                            }
                            let _ = self.state_tx.send(LiveState::Active);
                            let _ = self.frames_tx.send(frame);
                        }
                        Err(e) => {
                            if self.cancel.is_cancelled() {
                                break;
                            }
                            // Swallow for this cycle only; keep looping.
                            tracing::warn!(
                                feed_id = %self.feed_id,
                                error = %e,
                                "Live sample cycle failed"
                            );
                            self.events.publish(EngineEvent::TransportFailure {
                                source: EventSource::LiveSampler,
                                feed_id: self.feed_id.clone(),
                                message: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        let _ = self.state_tx.send(LiveState::Stopped);
        tracing::debug!(feed_id = %self.feed_id, "Live sampling loop exited");
    }

    /// One capture/encode/detect round trip.
    async fn cycle(&self, started: Instant) -> Result<FilteredDetectionFrame, TransportError> {
        let image = self.grabber.grab_frame().await?;
        let polygons = self.store.polygons().await;

        // Attach zones so the detector filters server-side; with no
        // zones defined, everyone counts.
        let zone_arg = if polygons.is_empty() {
            None
        } else {
            Some(polygons.as_slice())
        };
        let boxes = self.detector.detect(&image, zone_arg).await?;

        // The returned boxes are already zone-filtered by the server;
        // no redundant client-side filtering on this path.
        Ok(FilteredDetectionFrame {
            timestamp: started.elapsed().as_secs_f64(),
            boxes,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
