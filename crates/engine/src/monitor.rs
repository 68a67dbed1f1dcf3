//! Background job status monitoring.
//!
//! Feed ingestion jobs run on an external processing service; the
//! monitor polls their status every 5 seconds until the job reaches a
//! terminal state or the poll budget (60 attempts, about five minutes)
//! is exhausted. Exhaustion resolves optimistically: long-running jobs
//! usually have finished by then, and downstream consumers would
//! rather proceed with possibly-partial detections than hang forever.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use zonewatch_core::job::JobStatus;
use zonewatch_core::types::FeedId;
use zonewatch_events::bus::EventSource;
use zonewatch_events::{EngineEvent, EventBus};

use crate::config::EngineConfig;
use crate::traits::JobStatusService;

/// Snapshot of a monitored job, updated on every poll.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Polls performed so far.
    pub attempts: u32,
    /// Set when the poll budget ran out before a terminal status was
    /// observed and the job was optimistically resolved as completed.
    pub timed_out: bool,
    /// The monitor loop has exited.
    pub finished: bool,
}

impl JobSnapshot {
    fn initial() -> Self {
        Self {
            status: JobStatus::Pending,
            attempts: 0,
            timed_out: false,
            finished: false,
        }
    }
}

struct ActiveMonitor {
    cancel: CancellationToken,
    snapshot_rx: watch::Receiver<JobSnapshot>,
    task: tokio::task::JoinHandle<()>,
}

/// At most one monitor per feed; starting a new one supersedes (and
/// cancels) any monitor already running for that feed.
pub struct JobMonitorRegistry {
    service: Arc<dyn JobStatusService>,
    events: Arc<EventBus>,
    config: EngineConfig,
    active: Mutex<HashMap<FeedId, ActiveMonitor>>,
}

impl JobMonitorRegistry {
    pub fn new(
        service: Arc<dyn JobStatusService>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            service,
            events,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Start monitoring a feed's processing job. Any existing monitor
    /// for the same feed is cancelled first; monitors for other feeds
    /// are unaffected.
    pub async fn start(&self, feed_id: FeedId) -> watch::Receiver<JobSnapshot> {
        let (snapshot_tx, snapshot_rx) = watch::channel(JobSnapshot::initial());
        let cancel = CancellationToken::new();

        let poll_loop = PollLoop {
            feed_id: feed_id.clone(),
            service: Arc::clone(&self.service),
            events: Arc::clone(&self.events),
            interval: self.config.job_poll_interval,
            max_attempts: self.config.job_poll_max_attempts,
            snapshot_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(poll_loop.run());

        let replaced = self.active.lock().await.insert(
            feed_id.clone(),
            ActiveMonitor {
                cancel,
                snapshot_rx: snapshot_rx.clone(),
                task,
            },
        );
        if let Some(old) = replaced {
            tracing::info!(feed_id = %feed_id, "Superseding existing job monitor");
            old.cancel.cancel();
            old.task.abort();
        }

        snapshot_rx
    }

    /// Latest snapshot for a feed, if a monitor was ever started and
    /// not superseded away.
    pub async fn snapshot(&self, feed_id: &str) -> Option<JobSnapshot> {
        self.active
            .lock()
            .await
            .get(feed_id)
            .map(|m| m.snapshot_rx.borrow().clone())
    }

    /// Cancel the monitor for one feed, if any.
    pub async fn stop(&self, feed_id: &str) {
        if let Some(monitor) = self.active.lock().await.remove(feed_id) {
            monitor.cancel.cancel();
            let _ = tokio::time::timeout(std::time::Duration::from_secs(5), monitor.task).await;
        }
    }
}

struct PollLoop {
    feed_id: FeedId,
    service: Arc<dyn JobStatusService>,
    events: Arc<EventBus>,
    interval: std::time::Duration,
    max_attempts: u32,
    snapshot_tx: watch::Sender<JobSnapshot>,
    cancel: CancellationToken,
}

impl PollLoop {
    async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        let mut last_status = JobStatus::Pending;

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(feed_id = %self.feed_id, "Job monitor cancelled");
                    return;
                }
                _ = interval.tick() => {}
            }

            match self.service.fetch_status(&self.feed_id).await {
                Ok(status) => {
                    if status != last_status {
                        tracing::info!(
                            feed_id = %self.feed_id,
                            status = status.as_str(),
                            attempt,
                            "Job status changed"
                        );
                        self.events.publish(EngineEvent::JobStatusChanged {
                            feed_id: self.feed_id.clone(),
                            status,
                            attempt,
                        });
                        last_status = status;
                    }
                    self.snapshot_tx.send_replace(JobSnapshot {
                        status,
                        attempts: attempt,
                        timed_out: false,
                        finished: false,
                    });

                    if status.is_terminal() {
                        self.finish(status, attempt, false);
                        return;
                    }
                }
                Err(e) => {
                    // A failed poll consumes an attempt like any other;
                    // the next tick retries.
                    tracing::warn!(
                        feed_id = %self.feed_id,
                        error = %e,
                        attempt,
                        "Job status poll failed"
                    );
                    self.events.publish(EngineEvent::TransportFailure {
                        source: EventSource::JobMonitor,
                        feed_id: self.feed_id.clone(),
                        message: e.to_string(),
                    });
                    self.snapshot_tx.send_modify(|s| s.attempts = attempt);
                }
            }
        }

        // Budget exhausted without a terminal status: resolve
        // optimistically as completed and flag the timeout so callers
        // can tell the two apart.
        tracing::warn!(
            feed_id = %self.feed_id,
            attempts = self.max_attempts,
            "Job monitor poll budget exhausted; assuming completion"
        );
        self.finish(JobStatus::Completed, self.max_attempts, true);
    }

    fn finish(&self, status: JobStatus, attempts: u32, timed_out: bool) {
        self.snapshot_tx.send_replace(JobSnapshot {
            status,
            attempts,
            timed_out,
            finished: true,
        });
        self.events.publish(EngineEvent::JobMonitorFinished {
            feed_id: self.feed_id.clone(),
            status,
            timed_out,
        });
        tracing::info!(
            feed_id = %self.feed_id,
            status = status.as_str(),
            attempts,
            timed_out,
            "Job monitor finished"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
