//! Sequential multi-zone analysis with best-effort aggregation.
//!
//! One analysis request per zone, issued sequentially so the external
//! service never sees concurrent load from a single run. A failed zone
//! is recorded and skipped; as long as at least one zone succeeds the
//! run produces a combined report over the successes.

use std::sync::Arc;

use serde::Serialize;
use zonewatch_core::analysis::{combine, CombinedAnalysis, ZoneAnalysis};
use zonewatch_core::types::{FeedId, ZoneId};
use zonewatch_core::CoreError;
use zonewatch_events::{EngineEvent, EventBus};

use crate::error::EngineError;
use crate::store::ZoneStore;
use crate::traits::ZoneAnalysisService;

/// One zone's failure inside an aggregate run.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneFailure {
    pub zone_id: ZoneId,
    pub message: String,
}

/// Outcome of an aggregate analysis run.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    pub feed_id: FeedId,
    /// Zones whose analysis succeeded.
    pub success_count: usize,
    /// Zones attempted.
    pub total_count: usize,
    /// Per-zone results, in zone order, successes only.
    pub analyses: Vec<ZoneAnalysis>,
    /// Cross-zone aggregate over the successes.
    pub combined: Option<CombinedAnalysis>,
    pub failures: Vec<ZoneFailure>,
}

/// Runs per-zone analyses against the external service and folds the
/// results back into the zone store.
pub struct ZoneAnalysisAggregator {
    service: Arc<dyn ZoneAnalysisService>,
    events: Arc<EventBus>,
}

impl ZoneAnalysisAggregator {
    pub fn new(service: Arc<dyn ZoneAnalysisService>, events: Arc<EventBus>) -> Self {
        Self { service, events }
    }

    /// Analyze the store's zones sequentially and aggregate.
    ///
    /// With `zone_ids` set, only the requested zones are analyzed (in
    /// the requested order); ids with no matching zone count as
    /// failures. Each success is written back to the zone's
    /// `last_analysis` before the next zone is attempted. Returns
    /// [`EngineError::AllAnalysesFailed`] when no zone succeeds (which
    /// covers the empty-store case too).
    pub async fn run(
        &self,
        feed_id: &FeedId,
        store: &ZoneStore,
        frame_step: u32,
        zone_ids: Option<&[ZoneId]>,
    ) -> Result<AggregateReport, EngineError> {
        let mut failures: Vec<ZoneFailure> = Vec::new();

        let all = store.list().await;
        let zones = match zone_ids {
            None => all,
            Some(ids) => {
                let mut selected = Vec::with_capacity(ids.len());
                for id in ids {
                    match all.iter().find(|z| z.id == *id) {
                        Some(zone) => selected.push(zone.clone()),
                        None => failures.push(ZoneFailure {
                            zone_id: id.clone(),
                            message: "zone not found".to_string(),
                        }),
                    }
                }
                selected
            }
        };
        let total_count = zones.len() + failures.len();

        let mut analyses: Vec<ZoneAnalysis> = Vec::with_capacity(zones.len());

        for zone in &zones {
            match self.service.analyze(feed_id, &zone.id, frame_step).await {
                Ok(analysis) => {
                    self.record(store, &zone.id, analysis.clone()).await;
                    self.events.publish(EngineEvent::ZoneAnalysisCompleted {
                        feed_id: feed_id.clone(),
                        zone_id: zone.id.clone(),
                    });
                    analyses.push(analysis);
                }
                Err(e) => {
                    tracing::warn!(
                        feed_id = %feed_id,
                        zone_id = %zone.id,
                        error = %e,
                        "Zone analysis failed; continuing with remaining zones"
                    );
                    self.events.publish(EngineEvent::ZoneAnalysisFailed {
                        feed_id: feed_id.clone(),
                        zone_id: zone.id.clone(),
                        message: e.to_string(),
                    });
                    failures.push(ZoneFailure {
                        zone_id: zone.id.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if analyses.is_empty() {
            return Err(EngineError::AllAnalysesFailed {
                total: total_count,
                failures,
            });
        }

        let combined = combine(&analyses);

        tracing::info!(
            feed_id = %feed_id,
            succeeded = analyses.len(),
            failed = failures.len(),
            "Aggregate analysis finished"
        );

        Ok(AggregateReport {
            feed_id: feed_id.clone(),
            success_count: analyses.len(),
            total_count,
            analyses,
            combined,
            failures,
        })
    }

    /// Write an analysis back to the store. The zone may have been
    /// deleted while the request was in flight; the stale result is
    /// discarded without failing the run.
    async fn record(&self, store: &ZoneStore, zone_id: &str, analysis: ZoneAnalysis) {
        match store.record_analysis(zone_id, analysis).await {
            Ok(()) => {}
            Err(CoreError::NotFound { .. }) => {
                tracing::debug!(zone_id, "Zone deleted mid-analysis; result discarded");
            }
            Err(e) => {
                tracing::warn!(zone_id, error = %e, "Failed to record analysis");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
