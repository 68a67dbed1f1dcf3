//! Broadcast event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`EngineEvent`]s. It
//! is designed to be shared via `Arc<EventBus>` across the engine's
//! components and the presentation layer.

use serde::Serialize;
use tokio::sync::broadcast;
use zonewatch_core::job::JobStatus;
use zonewatch_core::types::{FeedId, ZoneId};

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// Which engine component produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    LiveSampler,
    JobMonitor,
    Aggregator,
}

/// A notification emitted by the engine.
#[derive(Debug, Clone, Serialize)]
pub enum EngineEvent {
    /// An external call failed. The originating loop has already
    /// swallowed the error and moved on; this is the side channel.
    TransportFailure {
        source: EventSource,
        feed_id: FeedId,
        message: String,
    },

    /// A job status poll observed a status different from the last
    /// one.
    JobStatusChanged {
        feed_id: FeedId,
        status: JobStatus,
        /// 1-based poll attempt that observed this status.
        attempt: u32,
    },

    /// A job monitor reached a terminal state or exhausted its budget.
    JobMonitorFinished {
        feed_id: FeedId,
        status: JobStatus,
        /// True when the attempt budget ran out and the job was
        /// optimistically treated as completed.
        timed_out: bool,
    },

    /// One zone's analysis request succeeded.
    ZoneAnalysisCompleted { feed_id: FeedId, zone_id: ZoneId },

    /// One zone's analysis request failed.
    ZoneAnalysisFailed {
        feed_id: FeedId,
        zone_id: ZoneId,
        message: String,
    },

    /// A live sampling session started.
    LiveStarted { feed_id: FeedId },

    /// A live sampling session stopped.
    LiveStopped { feed_id: FeedId },
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers
/// can independently receive every published [`EngineEvent`].
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are
    /// dropped and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently
    /// dropped — the engine's loops never block on consumers.
    pub fn publish(&self, event: EngineEvent) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(EngineEvent::JobStatusChanged {
            feed_id: "feed-1".into(),
            status: JobStatus::Processing,
            attempt: 3,
        });

        let received = rx.recv().await.expect("should receive the event");
        match received {
            EngineEvent::JobStatusChanged {
                feed_id,
                status,
                attempt,
            } => {
                assert_eq!(feed_id, "feed-1");
                assert_eq!(status, JobStatus::Processing);
                assert_eq!(attempt, 3);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(EngineEvent::LiveStarted {
            feed_id: "feed-2".into(),
        });

        assert!(matches!(
            rx1.recv().await.unwrap(),
            EngineEvent::LiveStarted { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            EngineEvent::LiveStarted { .. }
        ));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(EngineEvent::LiveStopped {
            feed_id: "orphan".into(),
        });
    }
}
